use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct VersionArgs {
    /// Show build details
    #[arg(long)]
    pub detailed: bool,
}

pub async fn execute(args: VersionArgs) -> Result<i32> {
    println!("{} {}", crate::PKG_NAME, crate::VERSION);
    if args.detailed {
        println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
        println!("License: {}", env!("CARGO_PKG_LICENSE"));
        println!("Rust Edition: 2024");
        println!(
            "Profile: {}",
            if cfg!(debug_assertions) { "debug" } else { "release" }
        );
    }
    Ok(0)
}
