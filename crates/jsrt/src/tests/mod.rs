use crate::{JsContext, JsRuntime, NativeEngine};
use std::sync::Arc;

mod fake_engine;
mod values;

use fake_engine::FakeEngine;

/// A fake engine with one runtime and one (not yet current) context.
struct Fixture {
    fake: Arc<FakeEngine>,
    engine: Arc<dyn NativeEngine>,
    context: JsContext,
    runtime: JsRuntime,
}

impl Fixture {
    fn new() -> Self {
        let fake = FakeEngine::new();
        let engine: Arc<dyn NativeEngine> = fake.clone();
        let runtime = JsRuntime::with_defaults(Arc::clone(&engine))
            .expect("runtime creation should succeed");
        let context = runtime
            .create_context()
            .expect("context creation should succeed");
        Self {
            fake,
            engine,
            context,
            runtime,
        }
    }
}
