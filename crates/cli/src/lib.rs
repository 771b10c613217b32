pub mod cli;
pub mod console;
pub mod instance;
pub mod logging;
pub mod run;
pub mod send;
