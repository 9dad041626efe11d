use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use driftscan_core::io::export::save_quicklook;
use driftscan_core::io::ProductStore;
use driftscan_core::pipeline::types::Product;

#[derive(Args)]
pub struct ExportArgs {
    /// Product file (.dsp)
    pub product: PathBuf,

    /// Output image (.png or .tiff)
    #[arg(short, long, default_value = "quicklook.png")]
    pub output: PathBuf,
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let store = ProductStore::new();
    let raster = match store.read(&args.product)? {
        Product::Scene(scene) => scene,
        Product::Field(field) => field.velocity_raster(),
        Product::Stack(pair) => pair.master,
    };

    save_quicklook(&raster, &args.output)?;
    println!("Quicklook saved to {}", args.output.display());
    Ok(())
}
