// ==========================================
// 飞行训练排班系统 - 命令行入口
// ==========================================
// 用法:
//   flight-roster <bundle.json> [--db <db_path>] [--requests <requests.csv>]
//
// 流程: 加载周数据包 → 生成 (或恢复) 首版 → 按序回放扰动 → 输出 JSON 报告
// 退出码: 0 成功, 2 输入, 3 约束, 4 扰动不一致, 5 超时, 6 存储, 1 其他
// ==========================================

use std::path::PathBuf;
use std::process::ExitCode;

use flight_roster::api::{ApiError, ApiResult, BundleRunReport};
use flight_roster::app::{get_default_db_path, AppState};
use flight_roster::importer::RosterBundle;

struct CliArgs {
    bundle: PathBuf,
    db_path: Option<String>,
    requests_csv: Option<PathBuf>,
}

fn parse_args() -> ApiResult<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut bundle = None;
    let mut db_path = None;
    let mut requests_csv = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                db_path = Some(
                    args.next()
                        .ok_or_else(|| ApiError::InvalidInput("--db 缺少路径".to_string()))?,
                );
            }
            "--requests" => {
                requests_csv = Some(PathBuf::from(args.next().ok_or_else(|| {
                    ApiError::InvalidInput("--requests 缺少路径".to_string())
                })?));
            }
            other if other.starts_with("--") => {
                return Err(ApiError::InvalidInput(format!("未知参数: {}", other)));
            }
            other => {
                if bundle.is_some() {
                    return Err(ApiError::InvalidInput(format!("多余参数: {}", other)));
                }
                bundle = Some(PathBuf::from(other));
            }
        }
    }

    let bundle = bundle.ok_or_else(|| {
        ApiError::InvalidInput(
            "用法: flight-roster <bundle.json> [--db <db_path>] [--requests <requests.csv>]"
                .to_string(),
        )
    })?;

    Ok(CliArgs {
        bundle,
        db_path,
        requests_csv,
    })
}

async fn run(args: CliArgs) -> ApiResult<BundleRunReport> {
    let mut bundle = RosterBundle::load(&args.bundle)?;
    if let Some(csv_path) = &args.requests_csv {
        let count = bundle.merge_request_csv(csv_path)?;
        tracing::info!("已追加CSV训练请求: {} 条", count);
    }

    let db_path = args.db_path.unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)?;
    state.roster_api.run_bundle(&bundle).await
}

#[tokio::main]
async fn main() -> ExitCode {
    flight_roster::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", flight_roster::APP_NAME);
    tracing::info!("系统版本: {}", flight_roster::VERSION);
    tracing::info!("==================================================");

    let result = match parse_args() {
        Ok(args) => run(args).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("报告序列化失败: {}", err);
                ExitCode::from(1)
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "执行失败");
            eprintln!("{}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
