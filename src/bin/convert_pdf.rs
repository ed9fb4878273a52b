use excuse_form::form::models::Config;
use excuse_form::pdf::{converter::DocumentConverter, models::Args};

use std::error::Error;

use clap::Parser;
use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    /* Setup logging */
    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config: Config = Figment::new()
        .merge(Json::file(&args.config_json_path))
        .merge(Env::prefixed("EXCUSE_").split("__"))
        .extract()?;
    let mut conversion = config.conversion;
    if let Some(profile) = args.profile {
        conversion.profile = profile;
    }

    let converter = DocumentConverter::from_config(&conversion);
    info!(
        "Converting {} with {:?}",
        args.source.display(),
        converter.strategy_names()
    );
    let pdf = converter.convert(&args.source).await?;
    println!("{}", pdf.display());
    Ok(())
}
