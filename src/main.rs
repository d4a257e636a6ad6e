use anyhow::Context;
use clap::Parser;
use estat_explorer::app::{self, CatalogDownloader, CatalogSync, MetadataLoader};
use estat_explorer::config::{CatalogCommand, Command, LlmCommand, MetadataCommand};
use estat_explorer::core::knowledge;
use estat_explorer::domain::model::QueryResult;
use estat_explorer::utils::logger;
use estat_explorer::utils::validation::{validate_numeric_id, Validate};
use estat_explorer::{
    CliConfig, EstatClient, EstatError, EtlEngine, LocalStorage, MetadataCache, OllamaAdvisor,
    QueryTranslator, Settings, StatsDataPipeline, StatsDataRequest, TableIndex,
};
use std::collections::BTreeMap;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEMO_QUERIES: &[&str] = &[
    "東京都の年齢別人口が知りたい",
    "最新の完全失業率を見たい",
    "都道府県別の人口を比較したい",
    "2020年の男女別人口データが欲しい",
    "賃金の統計データを探している",
];
const EXIT_WORDS: &[&str] = &["quit", "exit", "終了"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&cli, &settings).await {
        let Some(e) = err.downcast_ref::<EstatError>() else {
            eprintln!("❌ {:#}", err);
            std::process::exit(1);
        };

        tracing::error!(
            "❌ {:#} (Category: {:?}, Severity: {:?})",
            err,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = e.severity().exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn load_settings(cli: &CliConfig) -> estat_explorer::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply_to(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn estat_client(settings: &Settings) -> estat_explorer::Result<EstatClient> {
    EstatClient::new(settings.require_app_id()?, &settings.estat)
}

fn open_metadata_cache(settings: &Settings) -> Option<MetadataCache> {
    match MetadataCache::open(settings.metadata_db_path()) {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::warn!("⚠️ Metadata cache unavailable: {}", e);
            None
        }
    }
}

async fn build_translator(settings: &Settings) -> estat_explorer::Result<QueryTranslator> {
    let translator =
        QueryTranslator::open(&settings.index_db_path(), settings.translator.latest_year)?;
    if !settings.ollama.enabled {
        return Ok(translator);
    }

    let advisor = OllamaAdvisor::connect(&settings.ollama, open_metadata_cache(settings)).await?;
    Ok(translator.with_advisor(Box::new(advisor)))
}

async fn fetch_table(
    settings: &Settings,
    stats_data_id: &str,
    parameters: BTreeMap<String, String>,
) -> estat_explorer::Result<String> {
    let pipeline = StatsDataPipeline::new(
        estat_client(settings)?,
        StatsDataRequest {
            stats_data_id: stats_data_id.to_string(),
            parameters,
            max_records: settings.estat.max_records,
        },
        LocalStorage::new(&settings.storage.output_dir),
    );
    EtlEngine::new(pipeline).run().await
}

async fn run(cli: &CliConfig, settings: &Settings) -> anyhow::Result<()> {
    match &cli.command {
        Command::Explore { stats_code, .. } => {
            validate_numeric_id("stats_code", stats_code, 8)?;
            let client = estat_client(settings)?;
            let storage = LocalStorage::new(&settings.storage.output_dir);
            let report =
                app::explore(&client, storage, stats_code, settings.estat.max_records).await?;
            report.print();
        }
        Command::Catalog(command) => run_catalog(command, settings).await?,
        Command::Metadata(command) => run_metadata(command, settings).await?,
        Command::Translate { query, fetch, .. } => {
            let translator = build_translator(settings).await?;
            let results = translator
                .translate_query(query, settings.translator.result_limit)
                .await?;

            let Some(best) = results.first() else {
                println!("❌ 該当する統計表が見つかりませんでした");
                print_suggestions(&translator, query);
                return Ok(());
            };
            print_result(best, usize::MAX);

            if *fetch {
                let output = fetch_table(settings, &best.stats_data_id, best.parameters.clone())
                    .await?;
                println!("\n📁 {}", output);
            }
        }
        Command::Suggest { partial } => {
            let translator =
                QueryTranslator::open(&settings.index_db_path(), settings.translator.latest_year)?;
            for suggestion in translator.get_query_suggestions(partial) {
                println!("{}", suggestion);
            }
        }
        Command::Fetch {
            stats_data_id,
            params,
            ..
        } => {
            validate_numeric_id("stats_data_id", stats_data_id, 10)?;
            let output =
                fetch_table(settings, stats_data_id, params.iter().cloned().collect()).await?;
            println!("✅ Output saved to: {}", output);
        }
        Command::Demo { .. } => {
            let translator = build_translator(settings).await?;
            run_demo(&translator, settings.translator.result_limit).await?;
        }
        Command::Llm(command) => run_llm(command, settings).await?,
    }

    Ok(())
}

async fn run_catalog(command: &CatalogCommand, settings: &Settings) -> anyhow::Result<()> {
    let index = || TableIndex::open(settings.index_db_path(), &knowledge::sample_tables());

    match command {
        CatalogCommand::Download { limit, field } => {
            let downloader =
                CatalogDownloader::new(estat_client(settings)?, &settings.storage.catalog_dir);
            let tables = match field {
                Some(field) => downloader.download_by_field(field, *limit).await?,
                None => downloader.download_all(*limit).await?,
            };
            if tables.is_empty() {
                println!("カタログデータを取得できませんでした。");
                return Ok(());
            }

            let catalogs = downloader.classify(&tables);
            let saved = downloader.save_catalogs(&catalogs)?;
            let (entries, index_path) = downloader.create_catalog_index(&catalogs)?;

            println!("\n=== ダウンロード完了 ===");
            println!("総統計表数: {}", tables.len());
            println!("分野数: {}", catalogs.len());
            println!("統計調査数: {}", entries.len());
            for path in &saved.field_files {
                println!("  {}", path.display());
            }
            if let Some(combined) = &saved.combined {
                println!("統合: {}", combined.display());
            }
            println!("サマリー: {}", saved.summary.display());
            println!("インデックス: {}", index_path.display());
        }
        CatalogCommand::Sync => {
            let sync = CatalogSync::new(&settings.storage.catalog_dir, index()?);
            let synced = sync.sync_catalog_to_index()?;
            println!("✅ {}件の統計表をインデックスに同期しました", synced);
        }
        CatalogCommand::Update { limit } => {
            let downloader =
                CatalogDownloader::new(estat_client(settings)?, &settings.storage.catalog_dir);
            let sync = CatalogSync::new(&settings.storage.catalog_dir, index()?);
            let synced = app::update_catalog_and_sync(&downloader, &sync, *limit).await?;
            println!("✅ {}件の統計表をインデックスに同期しました", synced);
        }
    }

    Ok(())
}

async fn run_metadata(command: &MetadataCommand, settings: &Settings) -> anyhow::Result<()> {
    let cache = MetadataCache::open(settings.metadata_db_path())?;

    match command {
        MetadataCommand::Refresh { max_tables } => {
            let loader = MetadataLoader::new(estat_client(settings)?, cache);
            let report = loader.update_metadata_cache(*max_tables).await?;
            println!(
                "✅ {}件の統計表, {}件の軸情報を保存しました",
                report.tables_saved, report.metadata_saved
            );
            if !report.failures.is_empty() {
                println!("⚠️ 取得に失敗: {}", report.failures.join(", "));
            }
        }
        MetadataCommand::Axes { table_id } => {
            let details = cache.get_table_axis_details(table_id)?;
            if details.is_empty() {
                println!(
                    "{} の軸情報はキャッシュにありません。`metadata refresh` を実行してください。",
                    table_id
                );
            }
            for axis in details {
                println!(
                    "\n[{}] {} {}",
                    axis.axis_id,
                    axis.axis_name,
                    if axis.unit.is_empty() {
                        String::new()
                    } else {
                        format!("({})", axis.unit)
                    }
                );
                for value in axis.values {
                    println!("  {}  {}", value.code, value.name);
                }
            }
        }
    }

    Ok(())
}

async fn run_llm(command: &LlmCommand, settings: &Settings) -> anyhow::Result<()> {
    let advisor = OllamaAdvisor::connect(&settings.ollama, open_metadata_cache(settings)).await?;

    match command {
        LlmCommand::Status => {
            let status = advisor.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        LlmCommand::Explain { table_id } => {
            let explanation = advisor.explain_axis_codes(table_id).await;
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
    }

    Ok(())
}

fn print_result(result: &QueryResult, max_alternatives: usize) {
    println!("✅ 統計表ID: {}", result.stats_data_id);
    println!("📊 表名: {}", result.table_name);
    println!("📝 説明: {}", result.description);
    println!("🔧 APIパラメータ: {:?}", result.parameters);
    println!("🎯 信頼度: {:.2}", result.confidence_score);

    if !result.alternative_suggestions.is_empty() {
        println!(
            "\n💡 代替案 ({}件):",
            result.alternative_suggestions.len()
        );
        for alt in result.alternative_suggestions.iter().take(max_alternatives) {
            println!(
                "   - {} [{}] (信頼度: {:.2})",
                alt.table_name, alt.stats_data_id, alt.confidence_score
            );
        }
    }
}

fn print_suggestions(translator: &QueryTranslator, query: &str) {
    let prefix: String = query.chars().take(5).collect();
    let suggestions = translator.get_query_suggestions(&prefix);
    if suggestions.is_empty() {
        return;
    }
    println!("\n💡 こんなクエリはいかがですか？");
    for suggestion in suggestions.iter().take(3) {
        println!("   - {}", suggestion);
    }
}

async fn run_demo(translator: &QueryTranslator, limit: usize) -> anyhow::Result<()> {
    println!("=== e-stat AI Query Translator デモ ===");

    for (i, query) in DEMO_QUERIES.iter().enumerate() {
        println!("\n{}. クエリ: 「{}」", i + 1, query);
        println!("{}", "-".repeat(50));

        match translator.translate_query(query, limit).await {
            Ok(results) => match results.first() {
                Some(result) => print_result(result, 2),
                None => println!("❌ 該当する統計表が見つかりませんでした"),
            },
            Err(e) => println!("❌ エラー: {}", e.user_friendly_message()),
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("🔍 インタラクティブモード（'quit'で終了）");
    println!("{}", "=".repeat(60));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n💬 クエリを入力してください: ");
        std::io::stdout().flush().context("flushing stdout")?;

        let Some(line) = lines.next_line().await.context("reading query from stdin")? else {
            break;
        };
        let query = line.trim();
        if EXIT_WORDS.contains(&query.to_lowercase().as_str()) {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match translator.translate_query(query, limit).await {
            Ok(results) => match results.first() {
                Some(result) => {
                    println!("\n✅ 結果:");
                    println!("   統計表ID: {}", result.stats_data_id);
                    println!("   表名: {}", result.table_name);
                    println!("   APIパラメータ: {:?}", result.parameters);
                }
                None => {
                    println!("\n❌ 該当する統計表が見つかりませんでした");
                    print_suggestions(translator, query);
                }
            },
            Err(e) => println!("❌ エラー: {}", e.user_friendly_message()),
        }
    }

    println!("\n👋 デモを終了します");
    Ok(())
}
