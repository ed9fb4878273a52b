use excuse_form::form::{
    helpers::{get_request, output_file_name},
    models::{Args, Config},
    run_tool::{generate_document, run},
    schedule_import::read_schedule_csv,
    template::FormTemplate,
};
use excuse_form::pdf::converter::DocumentConverter;

use std::{error::Error, fs};

use chrono::Local;
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

    /* Get request and config from corresponding json's */
    let args = Args::parse();
    let mut config: Config = Figment::new()
        .merge(Json::file(&args.config_json_path))
        .merge(Env::prefixed("EXCUSE_").split("__"))
        .extract()?;
    info!(
        "Read config.json from {}",
        std::path::absolute(&args.config_json_path)?.display()
    );
    if let Some(profile) = args.profile {
        config.conversion.profile = profile;
    }

    let mut request = get_request(&args.request_json_path)?;
    if let Some(csv_path) = &args.schedule_csv_path {
        request.schedule = read_schedule_csv(csv_path)?;
    }

    /* Fill the form */
    let template = FormTemplate::new(&config.template_paths);
    let now = Local::now().naive_local();
    if args.skip_pdf {
        fs::create_dir_all(&config.output_dir)?;
        let document = config.output_dir.join(output_file_name(&request, now));
        generate_document(&request, &template, &config, now.date(), &document)?;
        println!("{}", document.display());
        return Ok(());
    }

    /* Fill and convert */
    let converter = DocumentConverter::from_config(&config.conversion);
    info!("Conversion order: {:?}", converter.strategy_names());
    let generated = run(&converter, &request, &template, &config, now).await?;
    println!("{}", generated.document.display());
    if let Some(portable) = generated.portable {
        println!("{}", portable.display());
    }
    Ok(())
}
