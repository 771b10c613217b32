//! Command catalog: command name to JavaScript expression.
//!
//! Short commands are inline expressions. Longer ones are script resources
//! bundled into the binary and optionally replaced by a same-named file from
//! a scripts directory. The catalog is built once at startup and is read-only
//! afterwards.
//!
//! Templates use `{name}` placeholders. Only the entry's declared parameters
//! are substituted, so ordinary JavaScript braces pass through untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::SKIP_SECONDS_PARAM;
use crate::queue::Params;

#[derive(Debug, Error)]
pub enum CatalogError {
	#[error("command `{command}` requires parameter `{param}`")]
	MissingParam { command: String, param: String },

	#[error("failed to read script {}: {source}", path.display())]
	Script {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Where an entry's template comes from.
#[derive(Debug, Clone, Copy)]
enum Source {
	Inline(&'static str),
	/// File name looked up in the scripts directory, with the bundled copy.
	Script { file: &'static str, bundled: &'static str },
}

struct Definition {
	name: &'static str,
	source: Source,
	params: &'static [&'static str],
	summary: &'static str,
}

const SKIP_PARAMS: &[&str] = &[SKIP_SECONDS_PARAM];

const DEFINITIONS: &[Definition] = &[
	Definition {
		name: "skip_forward",
		source: Source::Inline("document.querySelector('video').currentTime += {skip_seconds}"),
		params: SKIP_PARAMS,
		summary: "Skipped forward {skip_seconds} seconds",
	},
	Definition {
		name: "skip_backward",
		source: Source::Inline("document.querySelector('video').currentTime -= {skip_seconds}"),
		params: SKIP_PARAMS,
		summary: "Skipped backward {skip_seconds} seconds",
	},
	Definition {
		name: "restart",
		source: Source::Inline("document.querySelector('video').currentTime = 0"),
		params: &[],
		summary: "Restarted video",
	},
	Definition {
		name: "cc",
		source: Source::Inline("document.querySelector('.ytp-subtitles-button')?.click()"),
		params: &[],
		summary: "Toggled Closed Captions (CC)",
	},
	Definition {
		name: "fullscreen",
		source: Source::Inline("document.querySelector('.ytp-fullscreen-button')?.click()"),
		params: &[],
		summary: "Toggled Fullscreen",
	},
	Definition {
		name: "theater",
		source: Source::Inline("document.querySelector('.ytp-size-button')?.click()"),
		params: &[],
		summary: "Toggled Theater Mode",
	},
	Definition {
		name: "quality_up",
		source: Source::Script {
			file: "quality_up.js",
			bundled: include_str!("../scripts/quality_up.js"),
		},
		params: &[],
		summary: "Increased video quality",
	},
	Definition {
		name: "quality_down",
		source: Source::Script {
			file: "quality_down.js",
			bundled: include_str!("../scripts/quality_down.js"),
		},
		params: &[],
		summary: "Decreased video quality",
	},
	Definition {
		name: "next_chapter",
		source: Source::Script {
			file: "next_chapter.js",
			bundled: include_str!("../scripts/next_chapter.js"),
		},
		params: &[],
		summary: "Skipped to next chapter",
	},
	Definition {
		name: "prev_chapter",
		source: Source::Script {
			file: "prev_chapter.js",
			bundled: include_str!("../scripts/prev_chapter.js"),
		},
		params: &[],
		summary: "Skipped to previous chapter",
	},
	Definition {
		name: "progress_bar",
		source: Source::Script {
			file: "progress_bar.js",
			bundled: include_str!("../scripts/progress_bar.js"),
		},
		params: &[],
		summary: "Toggled progress bar visibility",
	},
	Definition {
		name: "video_navigator",
		source: Source::Script {
			file: "video_navigator.js",
			bundled: include_str!("../scripts/video_navigator.js"),
		},
		params: &[],
		summary: "Toggled video navigator",
	},
	Definition {
		name: "navigator_select",
		source: Source::Inline("window.videoNavController?.select()"),
		params: &[],
		summary: "Selected item in navigator",
	},
	Definition {
		name: "navigator_layout",
		source: Source::Inline("window.videoNavController?.toggleLayout()"),
		params: &[],
		summary: "Changed navigator layout",
	},
	Definition {
		name: "navigator_up",
		source: Source::Inline("window.videoNavController?.up()"),
		params: &[],
		summary: "Moved up in navigator",
	},
	Definition {
		name: "navigator_down",
		source: Source::Inline("window.videoNavController?.down()"),
		params: &[],
		summary: "Moved down in navigator",
	},
	Definition {
		name: "navigator_left",
		source: Source::Inline("window.videoNavController?.left()"),
		params: &[],
		summary: "Moved left in navigator",
	},
	Definition {
		name: "navigator_right",
		source: Source::Inline("window.videoNavController?.right()"),
		params: &[],
		summary: "Moved right in navigator",
	},
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
	pub name: String,
	pub template: String,
	pub required_params: BTreeSet<String>,
	/// Status line shown after a successful send; may use the same
	/// placeholders as the template.
	pub summary: String,
}

impl CatalogEntry {
	/// Renders the expression, substituting every required parameter.
	pub fn render(&self, params: &Params) -> Result<String, CatalogError> {
		let mut expression = self.template.clone();
		for name in &self.required_params {
			let value = params.get(name).ok_or_else(|| CatalogError::MissingParam {
				command: self.name.clone(),
				param: name.clone(),
			})?;
			expression = expression.replace(&format!("{{{name}}}"), &value.to_string());
		}
		Ok(expression)
	}

	/// Renders the status summary; unknown placeholders are left as-is.
	pub fn summary(&self, params: &Params) -> String {
		params.iter().fold(self.summary.clone(), |text, (name, value)| {
			text.replace(&format!("{{{name}}}"), &value.to_string())
		})
	}
}

#[derive(Debug, Clone)]
pub struct Catalog {
	entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
	/// Catalog using only the scripts compiled into the binary.
	pub fn builtin() -> Self {
		let entries = DEFINITIONS
			.iter()
			.map(|def| {
				let template = match def.source {
					Source::Inline(expr) => expr,
					Source::Script { bundled, .. } => bundled,
				};
				(def.name.to_string(), entry(def, template.to_string()))
			})
			.collect();
		Self { entries }
	}

	/// Catalog whose script resources may be overridden from `scripts_dir`.
	///
	/// A file missing from the directory falls back to the bundled copy; any
	/// other read failure is an error.
	pub fn load(scripts_dir: Option<&Path>) -> Result<Self, CatalogError> {
		let Some(dir) = scripts_dir else {
			return Ok(Self::builtin());
		};

		let mut entries = BTreeMap::new();
		for def in DEFINITIONS {
			let template = match def.source {
				Source::Inline(expr) => expr.to_string(),
				Source::Script { file, bundled } => {
					let path = dir.join(file);
					match std::fs::read_to_string(&path) {
						Ok(script) => {
							debug!(target = "ytctl.catalog", command = def.name, path = %path.display(), "using script override");
							script
						}
						Err(err) if err.kind() == io::ErrorKind::NotFound => bundled.to_string(),
						Err(source) => return Err(CatalogError::Script { path, source }),
					}
				}
			};
			entries.insert(def.name.to_string(), entry(def, template));
		}
		Ok(Self { entries })
	}

	/// Case-sensitive exact lookup.
	pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
		self.entries.get(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
		self.entries.values()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

fn entry(def: &Definition, template: String) -> CatalogEntry {
	CatalogEntry {
		name: def.name.to_string(),
		template,
		required_params: def.params.iter().map(|p| p.to_string()).collect(),
		summary: def.summary.to_string(),
	}
}
