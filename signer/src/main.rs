use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, Command};
use std::path::PathBuf;

use redwax_sign::orchestrator::SKIP_WARNING_TARGET;
use redwax_sign::{sign_firmware, CliOptions, Environment, Error, SigningConfig};

fn start() -> Result<(), Error> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("bin")
                .short('b')
                .long("bin")
                .value_name("unsigned_file")
                .help("Unsigned firmware binary"),
        )
        .arg(
            Arg::new("out")
                .short('o')
                .long("out")
                .value_name("output_file")
                .help("Signed container to write"),
        )
        .arg(
            Arg::new("privatekey")
                .short('s')
                .long("privatekey")
                .value_name("key_file")
                .help("PEM file with signer certificate and private key (overridden by OTA_SIGNING_KEY_FILE)"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("model")
                .help("Device model number"),
        )
        .arg(
            Arg::new("hw-rev")
                .short('r')
                .long("hw-rev")
                .value_name("revision")
                .help("Device hardware revision number"),
        )
        .arg(
            Arg::new("build-flag")
                .long("build-flag")
                .value_name("flag")
                .action(ArgAction::Append)
                .allow_hyphen_values(true)
                .help("Build flag such as '-D HW_MODEL=UCD2' (repeatable)"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Prints debugging information"),
        )
        .get_matches();

    let mut logger = env_logger::builder();
    logger
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env();
    if matches.get_flag("debug") {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.filter_module(SKIP_WARNING_TARGET, log::LevelFilter::Warn);
    logger.init();

    let path = |name: &str| matches.get_one::<String>(name).map(PathBuf::from);
    let cli = CliOptions {
        bin: path("bin"),
        out: path("out"),
        private_key: path("privatekey"),
        model: matches.get_one::<String>("model").cloned(),
        hw_rev: matches.get_one::<String>("hw-rev").cloned(),
        build_flags: matches
            .get_many::<String>("build-flag")
            .map(|flags| flags.cloned().collect())
            .unwrap_or_default(),
    };

    let config = SigningConfig::assemble(cli, Environment::capture());
    sign_firmware(&config)?;
    Ok(())
}

fn main() {
    if let Err(e) = start() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
