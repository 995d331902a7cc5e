//! Non blocking dispatch of remote calls and the explicit points where the
//! coordinator waits on them.

use std::{future::Future, sync::Arc};

use comms::{Batch, RemoteErr, RemoteResult, Replica};
use futures::{
    FutureExt,
    future::{self, BoxFuture, Shared},
};
use log::debug;

use crate::Result;

/// A cloneable handle to the eventual result of a dispatched call.
pub type Pending<T = Batch> = Shared<BoxFuture<'static, RemoteResult<T>>>;

/// Spawns `fut` right away and returns a handle to its result.
///
/// # Arguments
/// * `origin` - Who runs the call, reported if the task itself dies.
/// * `fut` - The call to run.
pub fn dispatch<T, F>(origin: impl Into<String>, fut: F) -> Pending<T>
where
    T: Clone + Send + Sync + 'static,
    F: Future<Output = RemoteResult<T>> + Send + 'static,
{
    let origin = origin.into();
    let handle = tokio::spawn(fut);

    async move {
        match handle.await {
            Ok(ret) => ret,
            Err(e) => Err(RemoteErr::new(origin, format!("remote task failed: {e}"))),
        }
    }
    .boxed()
    .shared()
}

/// Dispatches a call on `replica`, the closure receives an owned handle to it.
pub fn call_remote<T, F, Fut>(replica: &Arc<dyn Replica>, f: F) -> Pending<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce(Arc<dyn Replica>) -> Fut,
    Fut: Future<Output = RemoteResult<T>> + Send + 'static,
{
    let origin = replica.name().to_string();
    dispatch(origin, f(Arc::clone(replica)))
}

/// A handle that is already resolved to `value`.
pub fn ready<T>(value: T) -> Pending<T>
where
    T: Clone + Send + Sync + 'static,
{
    future::ready(Ok(value)).boxed().shared()
}

/// Blocks until every handle completes.
///
/// # Returns
/// The values in the order of `handles`, or the first failure.
pub async fn get<T>(handles: Vec<Pending<T>>) -> Result<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Ok(future::try_join_all(handles).await?)
}

/// Like `get`, labelling the wait for diagnostics.
pub async fn wait<T>(handles: Vec<Pending<T>>, desc: &str) -> Result<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let n = handles.len();
    debug!(desc = desc; "waiting for {n} remote call(s)");

    let values = get(handles).await?;
    debug!(desc = desc; "{n} remote call(s) done");
    Ok(values)
}
