use airtable_export::adapters::csv_preview::write_preview;
use airtable_export::config::cli::{Cli, Command, ExportArgs, ReadArgs};
use airtable_export::domain::ports::TableSink;
use airtable_export::utils::{logger, validation::Validate};
use airtable_export::{load_config, AirtableClient, AppPaths, EtlError, ExportEngine, ParquetSink};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    let paths = AppPaths::from_root(&cli.root);
    tracing::debug!("Project paths: {:?}", paths);

    let exit_code = match cli.command {
        Command::Export(args) => export(args, paths).await,
        Command::Read(args) => read(args, &paths),
        #[cfg(feature = "web")]
        Command::Serve(args) => serve::serve(args, paths).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn report_fatal(error: &EtlError) {
    tracing::error!("❌ {} (severity: {:?})", error, error.severity());
    tracing::error!("💡 Suggestion: {}", error.recovery_suggestion());
    eprintln!("❌ {}", error);
}

async fn export(args: ExportArgs, paths: AppPaths) -> i32 {
    if let Err(e) = args.validate() {
        report_fatal(&e);
        return 1;
    }

    let config_path = paths.resolve(&args.config);
    tracing::info!(
        "📁 Loading {} (profile '{}')",
        config_path.display(),
        args.profile
    );

    let config = match load_config(&config_path, &args.profile) {
        Ok(config) => config,
        Err(e) => {
            report_fatal(&e);
            return 1;
        }
    };

    let client = match AirtableClient::from_env(args.airtable_settings()) {
        Ok(client) => client,
        Err(e) => {
            report_fatal(&e);
            return 1;
        }
    };

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let engine = ExportEngine::new_with_monitoring(client, ParquetSink::new(), paths, args.monitor);
    let summary = engine.run(&config).await;
    if summary.failed() > 0 {
        tracing::warn!("⚠️ {} table(s) failed, see errors above", summary.failed());
    }

    println!("\n✅ All exports completed.");
    0
}

fn read(args: ReadArgs, paths: &AppPaths) -> i32 {
    let input = paths.resolve(&args.input);

    let Some(table) = ParquetSink::new().read(&input, &args.table) else {
        eprintln!("❌ Unable to read table. Please check the table name and file path.");
        return 1;
    };

    tracing::info!(
        "📄 {} rows x {} columns in table '{}'",
        table.row_count(),
        table.column_count(),
        args.table
    );

    match write_preview(&table, args.limit, std::io::stdout().lock()) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("❌ Error printing table: {}", e);
            1
        }
    }
}

#[cfg(feature = "web")]
mod serve {
    use airtable_export::config::cli::ServeArgs;
    use airtable_export::utils::validation::Validate;
    use airtable_export::web::{run_server, WebState};
    use airtable_export::{AirtableClient, AirtableSettings, AppPaths};
    use anyhow::Context;

    pub async fn serve(args: ServeArgs, paths: AppPaths) -> anyhow::Result<i32> {
        if let Err(e) = args.validate() {
            super::report_fatal(&e);
            return Ok(1);
        }

        let program = std::env::current_exe().context("cannot locate the running executable")?;
        let mut state = WebState::new(paths, program);

        match AirtableClient::from_env(AirtableSettings::default()) {
            Ok(client) => state = state.with_airtable(client),
            Err(e) => tracing::debug!("Airtable metadata disabled: {}", e),
        }

        run_server(state, &args.bind)
            .await
            .with_context(|| format!("server on {} stopped with an error", args.bind))?;
        Ok(0)
    }
}
