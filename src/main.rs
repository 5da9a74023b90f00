#[tokio::main]
async fn main() {
    if let Err(e) = intake_lib::run().await {
        tracing::error!(error = %e, "Symptom intake failed");
        eprintln!("symptom-intake: {e}");
        std::process::exit(1);
    }
}
