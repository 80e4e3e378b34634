//! Basic example: a queued target writing dated files under `./logs`.
//!
//! Run with:
//! ```bash
//! cargo run --example basic
//! ```

use rotalog::{Command, ConcurrencyMode, LogTarget, Postfix, Severity};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = LogTarget::builder()
        .with_log_dir("logs")
        .with_app_name("basic")
        .with_postfix(Postfix::Day)
        .with_mode(ConcurrencyMode::MultiThreadedSeparateThread)
        .with_colour(true)
        .build()?;

    println!("Writing to {}", target.log_path());

    target.log(Severity::Info, "This is an info message")?;
    target.log(Severity::Warning, "This is a warning message")?;
    target.log(Severity::Error, "This is an error message")?;
    target.log_binary(Severity::Debug, "Some bytes", b"rotalog binary payload".to_vec())?;

    // Console output off from here on, in queue order
    target.command(Command::NoEcho(true))?;
    target.log(Severity::Info, "Only in the file")?;

    target.shutdown()?;
    println!("{:?}", target.stats());
    Ok(())
}
