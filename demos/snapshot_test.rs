use listing_scraper::{ScraperConfig, SnapshotRequest, SnapshotService, SqliteSnapshotStore};
use tokio_util::sync::CancellationToken;
use tower::Service;

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter("info,listing_scraper=debug")
        .init();

    // 環境変数から設定を取得 (SCRAPER_BASE_URL, SCRAPER_MAX_PAGES など)
    let config = ScraperConfig::from_env()
        .expect("SCRAPER_* environment variables are invalid")
        .with_headless(false); // デバッグ用に表示モード

    let db_url = std::env::var("SNAPSHOT_DB").unwrap_or_else(|_| "sqlite://listings.db".to_string());
    let store = SqliteSnapshotStore::connect(&db_url)
        .await
        .expect("Failed to open snapshot database");
    let mut service = SnapshotService::new(store);

    // Ctrl+C で途中までの結果を保存して終了
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("中断要求を受信しました");
            ctrl_c.cancel();
        }
    });

    println!("=== Listing Snapshot Test ===");

    let request = SnapshotRequest::new(config)
        .with_cancel(cancel)
        .with_export_dir("./data");

    match service.call(request).await {
        Ok(result) => {
            println!(
                "成功! {}件取得 / {}件保存 ({:?})",
                result.batch.len(),
                result.inserted,
                result.batch.stop_reason
            );
            if let Some(path) = result.export_path {
                println!("JSON保存先: {:?}", path);
            }
            println!("\n First 10 Results:");
            for record in result.batch.records.iter().take(10) {
                println!(
                    "{:>4} | {:<20} | {:<15}",
                    record.rank.map(|r| r.to_string()).unwrap_or_default(),
                    record.name,
                    record.price
                );
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }
}
