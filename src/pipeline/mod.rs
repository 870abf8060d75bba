//! # Request and Response Pipelines
//!
//! Every typed route runs the same sequence around its handler:
//!
//! ```text
//! middleware.before (outermost first)
//!   content type -> size limit -> decode -> unknown fields -> transform -> validate
//!     handler
//!   negotiate -> serialize success | map and serialize error
//! middleware.after (innermost first)
//! ```
//!
//! A failing request stage short-circuits: the handler never runs and the error is
//! written through the same negotiated error path as handler failures. Panics are
//! not caught here; the server recovers them once, around the whole chain.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::middleware::Middleware;
use crate::schema::ToSchema;
use crate::server::{HttpRequest, ResponseWriter};

pub(crate) mod request;
pub(crate) mod response;

pub use self::response::{negotiate, Format};

/// Post-decode normalization hook, run before validation.
///
/// `#[derive(ToSchema)]` emits an empty impl unless the type is marked
/// `#[schema(transform)]`, in which case it implements the hook itself. An error
/// aborts the request and is passed to the error handler unmodified.
///
/// ```
/// use ember::{InTransform, ToSchema};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, ToSchema)]
/// #[schema(transform)]
/// struct NewTag {
///     name: String,
/// }
///
/// impl InTransform for NewTag {
///     fn in_transform(&mut self) -> anyhow::Result<()> {
///         self.name = self.name.trim().to_lowercase();
///         Ok(())
///     }
/// }
/// ```
pub trait InTransform {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

macro_rules! no_transform {
    ($($ty:ty),* $(,)?) => {
        $(impl InTransform for $ty {})*
    };
}

no_transform!(
    (), bool, char, String, Value, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
    f32, f64,
);

impl<T: InTransform> InTransform for Vec<T> {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        self.iter_mut().try_for_each(InTransform::in_transform)
    }
}

impl<T: InTransform> InTransform for Option<T> {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        match self {
            Some(inner) => inner.in_transform(),
            None => Ok(()),
        }
    }
}

impl<T: InTransform + ?Sized> InTransform for Box<T> {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        (**self).in_transform()
    }
}

impl<K, V: InTransform, S> InTransform for HashMap<K, V, S> {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        self.values_mut().try_for_each(InTransform::in_transform)
    }
}

impl<K, V: InTransform> InTransform for BTreeMap<K, V> {
    fn in_transform(&mut self) -> anyhow::Result<()> {
        self.values_mut().try_for_each(InTransform::in_transform)
    }
}

/// Shapes accepted as request bodies.
pub trait RequestBody: DeserializeOwned + Serialize + ToSchema + InTransform + Send + 'static {}

impl<T> RequestBody for T where T: DeserializeOwned + Serialize + ToSchema + InTransform + Send + 'static {}

/// Shapes returned by typed handlers.
pub trait ResponseBody: Serialize + ToSchema + Send + 'static {}

impl<T> ResponseBody for T where T: Serialize + ToSchema + Send + 'static {}

/// Run `inner` inside the middleware onion.
///
/// `before` hooks run in order until one answers; `after` hooks then run in reverse
/// for every layer that was entered, including the one that answered.
pub(crate) fn run_chain<F>(
    middlewares: &[Arc<dyn Middleware>],
    req: &mut HttpRequest,
    writer: &mut ResponseWriter,
    inner: F,
) where
    F: FnOnce(&mut HttpRequest, &mut ResponseWriter),
{
    let start = Instant::now();
    let mut entered = 0;
    let mut answered = false;
    for middleware in middlewares {
        entered += 1;
        if let Some(response) = middleware.before(req) {
            writer.write_response(response);
            answered = true;
            break;
        }
    }

    if !answered {
        inner(req, writer);
    }

    for middleware in middlewares[..entered].iter().rev() {
        middleware.after(req, writer, start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::HttpResponse;
    use http::Method;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        answer: bool,
    }

    impl Middleware for Recorder {
        fn before(&self, _req: &mut HttpRequest) -> Option<HttpResponse> {
            self.log.lock().unwrap().push(format!("before {}", self.name));
            self.answer.then(|| HttpResponse::text(401, "stop"))
        }

        fn after(&self, _req: &HttpRequest, _res: &mut ResponseWriter, _latency: Duration) {
            self.log.lock().unwrap().push(format!("after {}", self.name));
        }
    }

    fn layers(log: &Arc<Mutex<Vec<String>>>, answer_at: Option<&str>) -> Vec<Arc<dyn Middleware>> {
        ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                Arc::new(Recorder {
                    name,
                    log: Arc::clone(log),
                    answer: answer_at == Some(name),
                }) as Arc<dyn Middleware>
            })
            .collect()
    }

    #[test]
    fn test_onion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut req = HttpRequest::new(Method::GET, "/");
        let mut writer = ResponseWriter::new();
        run_chain(&layers(&log, None), &mut req, &mut writer, |_, w| {
            w.write(200, "text/plain", "ok");
        });
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before a", "before b", "before c", "after c", "after b", "after a"]
        );
    }

    #[test]
    fn test_short_circuit_skips_inner_layers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut req = HttpRequest::new(Method::GET, "/");
        let mut writer = ResponseWriter::new();
        run_chain(&layers(&log, Some("b")), &mut req, &mut writer, |_, _| {
            panic!("handler must not run");
        });
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before a", "before b", "after b", "after a"]
        );
        assert_eq!(writer.status(), 401);
    }

    #[test]
    fn test_collections_transform_each_element() {
        struct Upper(String);
        impl InTransform for Upper {
            fn in_transform(&mut self) -> anyhow::Result<()> {
                self.0 = self.0.to_uppercase();
                Ok(())
            }
        }
        let mut items = vec![Upper("a".into()), Upper("b".into())];
        items.in_transform().unwrap();
        assert_eq!(items[1].0, "B");

        let mut missing: Option<Upper> = None;
        assert!(missing.in_transform().is_ok());
    }
}
