//! Exit codes and messages of the `ytctl` binary.

use std::path::Path;
use std::process::{Command, Output};

use ytctl_cli::instance::InstanceGuard;

fn ytctl(args: &[&str], config_home: &Path) -> Output {
	Command::new(env!("CARGO_BIN_EXE_ytctl"))
		.args(args)
		.env("XDG_CONFIG_HOME", config_home)
		.env_remove("YTCTL_PORT")
		.env_remove("YTCTL_CONFIG")
		.output()
		.expect("failed to execute ytctl")
}

fn free_port() -> u16 {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

#[test]
fn commands_lists_the_catalog() {
	let home = tempfile::tempdir().unwrap();
	let output = ytctl(&["commands"], home.path());
	assert!(output.status.success());

	let stdout = String::from_utf8_lossy(&output.stdout);
	for name in ["skip_forward", "quality_up", "navigator_right", "video_navigator"] {
		assert!(stdout.contains(name), "missing {name} in:\n{stdout}");
	}
	assert!(stdout.contains("Skipped forward 5 seconds"));
}

#[test]
fn send_without_controller_fails() {
	let home = tempfile::tempdir().unwrap();
	let port = free_port().to_string();
	let output = ytctl(&["send", "skip_forward", "--port", &port], home.path());

	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stderr).contains("no controller listening"));
}

#[test]
fn second_instance_exits_with_failure() {
	let home = tempfile::tempdir().unwrap();
	let lock = home.path().join("ytctl.lock");
	let _held = InstanceGuard::acquire(&lock).unwrap();

	let port = free_port().to_string();
	let output = ytctl(
		&["run", "--port", &port, "--lock-file", lock.to_str().unwrap()],
		home.path(),
	);

	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stderr).contains("already running"));
}

#[test]
fn busy_control_port_exits_with_failure() {
	let home = tempfile::tempdir().unwrap();
	let lock = home.path().join("ytctl.lock");
	let busy = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let port = busy.local_addr().unwrap().port().to_string();

	let output = ytctl(
		&["run", "--port", &port, "--lock-file", lock.to_str().unwrap()],
		home.path(),
	);

	assert_eq!(output.status.code(), Some(1));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains(&format!("port {port} is already in use")), "stderr: {stderr}");
	assert!(!lock.exists(), "lock file left behind");
}
