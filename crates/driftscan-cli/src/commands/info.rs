use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use driftscan_core::io::product::peek_header;

#[derive(Args)]
pub struct InfoArgs {
    /// Product file (.dsp)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let header = peek_header(&args.file)?;

    println!("File:        {}", args.file.display());
    println!("Kind:        {}", header.kind_name());
    println!("Dimensions:  {}x{}", header.width, header.height);
    println!("Bands:       {}", header.band_count);
    if header.az_spacing > 0 {
        println!(
            "Lattice:     {} az x {} rg pixel spacing",
            header.az_spacing, header.rg_spacing
        );
    }
    println!(
        "Origin:      ({:.2}, {:.2})",
        header.geo.origin_x, header.geo.origin_y
    );
    println!(
        "Pixel size:  {:.2} x {:.2} m",
        header.geo.pixel_width,
        header.geo.pixel_height.abs()
    );

    for (slot, (id, ts)) in header
        .scene_ids
        .iter()
        .zip(header.timestamps.iter())
        .enumerate()
    {
        if id.is_empty() {
            continue;
        }
        match ts {
            Some(us) => println!("Scene {}:     {} (t = {} us)", slot, id, us),
            None => println!("Scene {}:     {}", slot, id),
        }
    }

    Ok(())
}
