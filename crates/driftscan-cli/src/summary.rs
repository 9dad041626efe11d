use console::Style;
use driftscan_core::pipeline::config::PipelineConfig;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &PipelineConfig) {
    let s = Styles::new();
    let t = &config.tracking;

    println!();
    println!("  {}", s.title.apply_to("Driftscan Pipeline"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(18)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Master"),
        s.path.apply_to(config.master.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Slave"),
        s.path.apply_to(config.slave.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("DEM"),
        s.method.apply_to(&config.coregistration.dem)
    );

    println!(
        "  {:<14}{}",
        s.label.apply_to("Orbit"),
        if config.orbit.apply {
            s.method.apply_to("precise".to_string())
        } else {
            s.disabled.apply_to("skipped".to_string())
        }
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Xcorr"),
        if config.coregistration.xcorr {
            s.method.apply_to("enabled".to_string())
        } else {
            s.disabled.apply_to("disabled".to_string())
        }
    );

    println!(
        "  {:<14}{}",
        s.label.apply_to("Grid"),
        s.value.apply_to(format!(
            "{} az x {} rg px",
            t.grid_azimuth_spacing, t.grid_range_spacing
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Window"),
        s.value
            .apply_to(format!("{}x{} px, {}x oversampling", t.window_width, t.window_height, t.oversampling))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(format!("{}", t.correlation_threshold))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Max velocity"),
        s.value.apply_to(format!("{} m/day", t.max_velocity))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Smoothing"),
        if t.spatial_average {
            s.value.apply_to(format!("{0}x{0} box", t.average_box_size))
        } else {
            s.disabled.apply_to("disabled".to_string())
        }
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Hole filling"),
        if t.fill_holes {
            s.value.apply_to(format!("radius {}", t.hole_fill_radius))
        } else {
            s.disabled.apply_to("disabled".to_string())
        }
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Ground grid"),
        s.value
            .apply_to(format!("{} m", config.terrain.pixel_spacing_m))
    );
    println!();
}
