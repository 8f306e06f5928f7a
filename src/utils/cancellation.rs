//! Cancelación cooperativa
//!
//! Cualquier operación del RouteManager se cancela al soltar su future: la
//! transacción abierta se descarta y el almacén hace rollback. Estas funciones
//! permiten además cancelar con una señal externa.

use futures::stream::{BoxStream, StreamExt};
use std::future::Future;

use crate::utils::errors::{RouteError, RouteResult};

/// Ejecutar `operation` hasta que termine o hasta que llegue `signal`
pub async fn run_cancellable<T, S, F>(signal: S, operation: F) -> RouteResult<T>
where
    S: Future<Output = ()>,
    F: Future<Output = RouteResult<T>>,
{
    tokio::select! {
        biased;
        _ = signal => {
            tracing::debug!("Operación cancelada por el llamador");
            Err(RouteError::Cancelled)
        }
        result = operation => result,
    }
}

/// Cortar un stream de resultados cuando llegue `signal`.
/// Al cortarse se suelta el stream interno y con él el cursor del almacén.
pub fn cancellable_stream<'a, T, S>(
    signal: S,
    stream: BoxStream<'a, RouteResult<T>>,
) -> BoxStream<'a, RouteResult<T>>
where
    T: Send + 'a,
    S: Future<Output = ()> + Send + 'a,
{
    stream.take_until(signal).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    #[tokio::test]
    async fn test_operation_wins_when_signal_never_fires() {
        let result = run_cancellable(std::future::pending(), async { Ok::<_, RouteError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_signal_cancels_pending_operation() {
        let result: RouteResult<()> = run_cancellable(
            tokio::time::sleep(Duration::from_millis(5)),
            std::future::pending(),
        )
        .await;
        assert_eq!(result, Err(RouteError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancellable_stream_stops_on_signal() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let source: BoxStream<'_, RouteResult<i32>> =
            stream::iter(vec![Ok(1), Ok(2)]).chain(stream::pending()).boxed();
        let mut items = cancellable_stream(
            async move {
                let _ = rx.await;
            },
            source,
        );

        assert_eq!(items.next().await, Some(Ok(1)));
        assert_eq!(items.next().await, Some(Ok(2)));
        tx.send(()).unwrap();
        assert_eq!(items.next().await, None);
    }
}
