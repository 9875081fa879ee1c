use hardware_order_fulfillment::adapter::driven::{
    ConsoleLogger, GatewayConfig, HttpPaymentGateway, MySqlActivityLog, MySqlBranchDirectory,
    MySqlOrderRepository, MySqlPaymentRepository, MySqlProductCatalog, MySqlStockRepository,
    MySqlTransferRepository,
};
use hardware_order_fulfillment::adapter::driver::rest_api::{create_router, AppStateInner};
use hardware_order_fulfillment::adapter::{DatabaseConfig, DatabaseMigration};
use hardware_order_fulfillment::application::service::{
    OrderApplicationService, PaymentApplicationService, StockApplicationService,
    TransferApplicationService,
};
use hardware_order_fulfillment::domain::service::StockMutationService;

use sqlx::mysql::MySqlPoolOptions;
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 金物店向け注文履行システム REST API ===");
    println!();

    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    // 設定はここで一度だけ読み込み、各アダプターへ明示的に渡す
    let config = DatabaseConfig::from_env()?;
    println!(
        "データベース設定を読み込みました: {}:{}",
        config.host, config.port
    );
    let gateway_config = GatewayConfig::from_env();
    let return_url = env::var("GATEWAY_RETURN_URL")
        .unwrap_or_else(|_| "http://localhost:3000/payments/gateway/return".to_string());
    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    // 接続プールを作成
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;
    println!("データベース接続プールを作成しました");

    // マイグレーションを実行
    let migration = DatabaseMigration::new(pool.clone());
    migration.run().await?;
    println!("データベースマイグレーションを実行しました");

    // ロガーとアダプターを作成
    let logger = Arc::new(ConsoleLogger::new());
    let order_repository = Arc::new(MySqlOrderRepository::new(pool.clone()));
    let stock_repository = Arc::new(MySqlStockRepository::new(pool.clone()));
    let transfer_repository = Arc::new(MySqlTransferRepository::new(pool.clone()));
    let payment_repository = Arc::new(MySqlPaymentRepository::new(pool.clone()));
    let directory = Arc::new(MySqlBranchDirectory::new(pool.clone()));
    let catalog = Arc::new(MySqlProductCatalog::new(pool.clone()));
    let activity_log = Arc::new(MySqlActivityLog::new(pool.clone(), logger.clone()));
    let gateway = Arc::new(HttpPaymentGateway::new(gateway_config));

    // ドメインサービスを作成
    let stock_service = Arc::new(StockMutationService::new(
        stock_repository.clone(),
        transfer_repository.clone(),
        directory.clone(),
    ));

    // アプリケーションサービスを作成
    let order_service = Arc::new(OrderApplicationService::new(
        order_repository.clone(),
        transfer_repository.clone(),
        directory.clone(),
        catalog.clone(),
        stock_service.clone(),
        activity_log.clone(),
        logger.clone(),
    ));
    let payment_service = Arc::new(PaymentApplicationService::new(
        payment_repository.clone(),
        order_repository.clone(),
        transfer_repository.clone(),
        stock_service.clone(),
        gateway,
        activity_log.clone(),
        logger.clone(),
        return_url,
    ));
    let transfer_service = Arc::new(TransferApplicationService::new(
        transfer_repository.clone(),
        stock_repository.clone(),
        order_repository.clone(),
        directory.clone(),
        stock_service.clone(),
        activity_log.clone(),
        logger.clone(),
    ));
    let stock_application_service = Arc::new(StockApplicationService::new(
        stock_repository,
        catalog,
        directory,
        activity_log,
        logger,
    ));

    // アプリケーション状態を作成
    let app_state = AppStateInner {
        order_service,
        payment_service,
        transfer_service,
        stock_service: stock_application_service,
    };

    // REST APIルーターを作成
    let app = create_router()
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // サーバーを起動
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    println!("REST APIサーバーが起動しました: http://{}", bind_address);
    println!("ヘルスチェック: GET /health");
    println!("API仕様:");
    println!("  POST /orders - チェックアウト（注文作成）");
    println!("  GET  /orders - 注文一覧取得");
    println!("  GET  /orders/:id - 注文詳細取得");
    println!("  POST /orders/:id/status - 注文状態変更");
    println!("  POST /orders/:id/cancel|ship|deliver - 注文操作");
    println!("  POST /orders/:id/take-preparation - ピッキング引き受け");
    println!("  POST /payments/gateway/:order_id/initiate - ゲートウェイ決済開始");
    println!("  GET  /payments/gateway/return - ゲートウェイ戻り");
    println!("  POST /payments/manual - 手動支払い登録");
    println!("  POST /transfers - 移送作成");
    println!("  POST /transfers/:id/dispatch|receive|complete|cancel - 移送操作");
    println!("  POST /stock/import - 在庫一括取り込み（CSV）");
    println!("  GET  /stock/summary/:branch_id - 店舗在庫集計");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
