use std::{fmt, future::Future, sync::Arc};

use color_eyre::eyre::Result;
use futures::{FutureExt, future::BoxFuture};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::actions::{ActionSender, CompAction};

use super::TypeaheadAction;

pub type SearchFuture<T> = BoxFuture<'static, Result<Vec<T>>>;

/// The asynchronous lookup a typeahead field runs for a query.
///
/// It must accept the empty string, which is used to list everything when
/// the dropdown is opened without typing.
pub struct SearchMethod<T>(Arc<dyn Fn(String) -> SearchFuture<T> + Send + Sync>);

impl<T> Clone for SearchMethod<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for SearchMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SearchMethod")
    }
}

impl<T: 'static> SearchMethod<T> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        Self(Arc::new(move |query| f(query).boxed()))
    }

    pub fn call(&self, query: String) -> SearchFuture<T> {
        (self.0)(query)
    }
}

/// What a finished search hands back to its widget.
pub(crate) struct SearchOutcome<T> {
    pub generation: u64,
    pub query: String,
    pub result: Result<Vec<T>>,
}

/// Body of the task spawned for every search.
///
/// The typed outcome goes through the widget's own channel, then the widget is
/// woken through the application action channel.
pub(crate) async fn run_search<T: Send + 'static>(
    method: SearchMethod<T>,
    query: String,
    generation: u64,
    owner: u64,
    outcome_tx: UnboundedSender<SearchOutcome<T>>,
    tx: ActionSender,
) {
    let result = method.call(query.clone()).await;
    let outcome = SearchOutcome {
        generation,
        query,
        result,
    };
    if outcome_tx.send(outcome).is_err() {
        debug!(owner, generation, "typeahead dropped before its search finished");
        return;
    }
    tx.send((CompAction::Typeahead(TypeaheadAction::SearchSettled), owner));
}
