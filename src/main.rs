use clap::{Arg, ArgAction, ArgMatches, Command};
use log::error;
use std::path::PathBuf;
use std::process;

use epsg_convert::{convert, ConversionConfig, Result};

fn cli() -> Command {
    Command::new("epsg-convert")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert point coordinates in tabular data between coordinate reference systems")
        .arg(
            Arg::new("input")
                .help("Input table (.csv, .txt, .tsv, .asc, .geojson, .xlsx, .xls, .ods)")
                .index(1),
        )
        .arg(
            Arg::new("output")
                .help("Output table, format chosen by extension")
                .index(2),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("TOML file with conversion parameters; flags override it")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("x")
                .short('x')
                .long("x")
                .help("X/longitude column (default x)")
                .value_name("COLUMN"),
        )
        .arg(
            Arg::new("y")
                .short('y')
                .long("y")
                .help("Y/latitude column (default y)")
                .value_name("COLUMN"),
        )
        .arg(
            Arg::new("z")
                .short('z')
                .long("z")
                .help("Z/elevation column (default z, created with zeros when missing)")
                .value_name("COLUMN"),
        )
        .arg(
            Arg::new("srs-input")
                .short('s')
                .long("srs-input")
                .help("Source CRS: EPSG code, epsg:NNNN, .wkt/.prj file, PROJ affine or compound a+b")
                .value_name("CRS"),
        )
        .arg(
            Arg::new("srs-output")
                .short('t')
                .long("srs-output")
                .help("Destination CRS")
                .value_name("CRS"),
        )
        .arg(
            Arg::new("clock")
                .long("clock")
                .help("Parse X/Y as degrees, minutes and seconds text first")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("srs-column")
                .long("srs-column")
                .help("Column holding each row's raw CRS value; enables lookup mode")
                .value_name("COLUMN"),
        )
        .arg(
            Arg::new("srs-lookup")
                .long("srs-lookup")
                .help("Two-column table (.csv or .xlsx) mapping raw CRS values to CRS descriptors")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("custom-crs")
                .long("custom-crs")
                .help("Zip archive holding custom .wkt/.prj definitions")
                .value_name("ZIP"),
        )
        .arg(
            Arg::new("prj")
                .long("prj")
                .help("Write a .prj sidecar with the destination CRS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue),
        )
}

/// Builds the run configuration from an optional TOML file and the flags
fn build_config(matches: &ArgMatches) -> Result<ConversionConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ConversionConfig::from_file(path)?,
        None => ConversionConfig::default(),
    };

    let text = |name: &str| matches.get_one::<String>(name).cloned();

    if let Some(input) = text("input") {
        config.input_path = PathBuf::from(input);
    }
    if let Some(output) = text("output") {
        config.output_path = PathBuf::from(output);
    }
    if let Some(x) = text("x") {
        config.x = x;
    }
    if let Some(y) = text("y") {
        config.y = y;
    }
    if let Some(z) = text("z") {
        config.z = z;
    }
    if let Some(srs) = text("srs-input") {
        config.srs_input = srs;
    }
    if let Some(srs) = text("srs-output") {
        config.srs_output = srs;
    }
    if let Some(column) = text("srs-column") {
        config.srs_column = column;
        config.convert_lookup = true;
    }
    if let Some(lookup) = text("srs-lookup") {
        config.srs_lookup = Some(PathBuf::from(lookup));
    }
    if let Some(archive) = text("custom-crs") {
        config.custom_crs_archive = Some(PathBuf::from(archive));
        config.custom_crs = true;
    }
    if matches.get_flag("clock") {
        config.convert_clock_to_decimal = true;
    }
    if matches.get_flag("prj") {
        config.write_prj = true;
    }

    Ok(config)
}

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = build_config(&matches).and_then(|config| convert::run(&config));
    match result {
        Ok(report) => println!("{}", report),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "srs_input = \"4326\"\nsrs_output = \"3857\"\nx = \"lon\"\n").unwrap();

        let matches = cli().get_matches_from([
            "epsg-convert",
            "in.csv",
            "out.csv",
            "--config",
            path.to_str().unwrap(),
            "-t",
            "32633",
            "--srs-column",
            "datum",
            "--prj",
        ]);
        let config = build_config(&matches).unwrap();

        assert_eq!(config.input_path, PathBuf::from("in.csv"));
        assert_eq!(config.srs_input, "4326");
        assert_eq!(config.srs_output, "32633");
        assert_eq!(config.x, "lon");
        assert!(config.convert_lookup);
        assert!(config.write_prj);
        assert!(!config.custom_crs);
    }
}
