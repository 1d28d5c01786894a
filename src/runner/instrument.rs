use std::future::Future;
use std::time::Instant;

/// Await `future` and log how long it took under `label`
pub async fn log_execution_time<F, T>(label: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let output = future.await;
    tracing::debug!(
        operation = label,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "query runner call finished"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_output_through() {
        let value = tokio_test::block_on(log_execution_time("findOne", async { 42 }));
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_passes_errors_through() {
        let result: Result<(), &str> = log_execution_time("updateOne", async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
    }
}
