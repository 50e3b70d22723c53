use std::path::Path;

use console::Style;

use crate::commands::run::RunConfig;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    path: Style,
    disabled: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            path: Style::new().underlined(),
            disabled: Style::new().dim().yellow(),
        }
    }
}

pub fn print_run_summary(source: &Path, config: &RunConfig, workers: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Slidecube Pipeline"));
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Source"),
        s.path.apply_to(source.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Level"),
        s.value.apply_to(config.level)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Tile size"),
        s.value.apply_to(config.tile_size)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Workers"),
        s.value.apply_to(workers)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Modalities"),
        s.value.apply_to(config.modalities.join(", "))
    );
    if config.ray_tracing {
        println!(
            "  {:<14}{} ({})",
            s.label.apply_to("Ray tracing"),
            s.value.apply_to(config.trace_modalities.join(", ")),
            config.statistics.join(", ")
        );
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Ray tracing"),
            s.disabled.apply_to("off")
        );
    }
    println!();
}
