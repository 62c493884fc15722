#[tokio::main]
async fn main() {
    oracle_notary::run().await;
}
