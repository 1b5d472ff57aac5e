mod bindings;
mod cli;
mod run;

use anyhow::Result;
use cli::{Command, InspectArgs};

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Inspect(args)) => inspect(args),
        None => run::run(cli.run),
    }
}

fn inspect(args: InspectArgs) -> Result<()> {
    let config = run::load_config(args.config.as_deref())?;
    let (transform, _kernel) = run::build_pipeline(&config)?;
    println!("{}", transform.inspect_devices());

    #[cfg(feature = "vulkan")]
    let (loader_report, supported) = {
        let loader = pixeltransform::VulkanLoader::new();
        let supported = transform.is_supported(&loader);
        (loader.describe(), supported)
    };
    #[cfg(not(feature = "vulkan"))]
    let (loader_report, supported) = (
        "vulkan support not compiled in".to_string(),
        transform.is_supported(&pixeltransform::StaticLoader(false)),
    );

    println!("loader: {loader_report}");
    println!("supported: {}", if supported { "yes" } else { "no" });
    Ok(())
}
