// ==========================================
// 物料盘点导入系统 - 命令行入口
// ==========================================
// 子命令:
// - extract: 工作簿 → 导入请求 JSON（stdout）
// - import: 抽取 → 地理定位 → 对账,输出诊断与状态
// - locality: 登记城市边界几何
// - serve: HTTP 服务（特性 server）
// ==========================================

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;

use deposit_import::app::{get_default_db_path, AppState};
use deposit_import::importer::{ImportError, SheetSelection, WorkbookImporter};
use deposit_import::logging;

#[derive(Debug, Parser)]
#[command(name = "deposit-import", version, about = "物料盘点导入系统")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 抽取工作簿并输出导入请求 JSON
    Extract {
        /// 工作簿文件（多个文件合并为一个工作簿）
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        overview_sheet: Option<String>,

        #[arg(long)]
        materials_sheet: Option<String>,
    },

    /// 抽取并导入目录
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// 数据库路径（默认用户数据目录）
        #[arg(long)]
        db: Option<String>,

        #[arg(long)]
        overview_sheet: Option<String>,

        #[arg(long)]
        materials_sheet: Option<String>,

        /// 不更新库存数量
        #[arg(long)]
        keep_quantities: bool,

        /// 跳过地理编码
        #[arg(long)]
        skip_geocode: bool,

        /// 选用的地理编码候选序号
        #[arg(long, default_value_t = 0)]
        candidate: usize,
    },

    /// 登记城市边界几何
    Locality {
        #[arg(long)]
        db: Option<String>,

        #[arg(long)]
        name: String,

        /// INSEE 代码
        #[arg(long)]
        code: String,

        /// GeoJSON 文件（Geometry / Feature / FeatureCollection）
        #[arg(long)]
        geometry: PathBuf,
    },

    /// 启动 HTTP 服务
    #[cfg(feature = "server")]
    Serve {
        #[arg(long)]
        db: Option<String>,

        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "server")]
    let json_logs = matches!(cli.command, Command::Serve { .. });
    #[cfg(not(feature = "server"))]
    let json_logs = false;

    if json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("{} v{}", deposit_import::APP_NAME, deposit_import::VERSION);

    match cli.command {
        Command::Extract {
            files,
            overview_sheet,
            materials_sheet,
        } => {
            let importer = WorkbookImporter::default();
            let selection = SheetSelection::new(overview_sheet, materials_sheet);
            match importer.extract_files(&files, &selection) {
                Ok(outcome) => {
                    let output = json!({
                        "request": outcome.to_request(true),
                        "status": outcome.diagnostics.status().code(),
                        "diagnostics": outcome.diagnostics,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                Err(e) => return Err(report_extraction_failure(e)),
            }
        }

        Command::Import {
            files,
            db,
            overview_sheet,
            materials_sheet,
            keep_quantities,
            skip_geocode,
            candidate,
        } => {
            let state = open_state(db).await?;
            let importer = WorkbookImporter::default();
            let selection = SheetSelection::new(overview_sheet, materials_sheet);

            let outcome = match importer.extract_files(&files, &selection) {
                Ok(outcome) => outcome,
                Err(e) => return Err(report_extraction_failure(e)),
            };

            let mut request = outcome.to_request(!keep_quantities);
            let mut log = outcome.diagnostics;
            if !skip_geocode {
                state
                    .import_api
                    .geolocator()
                    .locate(&mut request.site, candidate, &mut log)
                    .await?;
            }

            let report = state.import_api.engine().import(&request).await;
            log.merge(report.diagnostics);

            let output = json!({
                "batch_id": report.batch_id,
                "deposit_id": report.deposit_id,
                "product_ids": report.product_ids,
                "status": log.status().code(),
                "diagnostics": log,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Locality {
            db,
            name,
            code,
            geometry,
        } => {
            let state = open_state(db).await?;
            let raw = std::fs::read_to_string(&geometry)
                .with_context(|| format!("无法读取几何文件 {}", geometry.display()))?;
            let geometry: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("几何文件不是有效 JSON: {}", geometry.display()))?;

            let body = json!({"name": name, "code": code, "geometry": geometry});
            let outcome = state.import_api.locality_geometry(&body.to_string()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        #[cfg(feature = "server")]
        Command::Serve { db, addr } => {
            let state = open_state(db).await?;
            deposit_import::app::server::serve(&addr, state.import_api.clone()).await?;
        }
    }

    Ok(())
}

async fn open_state(db: Option<String>) -> anyhow::Result<AppState> {
    let db_path = db.unwrap_or_else(get_default_db_path);
    AppState::new(db_path).await.map_err(anyhow::Error::msg)
}

/// 中止类错误先输出携带的诊断
fn report_extraction_failure(err: ImportError) -> anyhow::Error {
    if !err.diagnostics().is_empty() {
        let output = json!({ "error": err.to_string(), "diagnostics": err.diagnostics() });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => tracing::warn!("诊断序列化失败: {}", e),
        }
    }
    anyhow::Error::new(err).context("抽取中止")
}
