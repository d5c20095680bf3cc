#![allow(dead_code)]

use stx_engine::{
    Context, FunctionRegistry, PatternCollector, SourceError, StaticContext, StreamDriver, Tree,
    parse_pattern,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compiles `patterns` (label, text) without namespaces and streams `xml`
/// through a collector.
pub fn collect(xml: &str, patterns: &[(&str, &str)]) -> Result<PatternCollector, Box<dyn std::error::Error>> {
    let registry = FunctionRegistry::with_builtins();
    let sc = StaticContext::new(&registry);
    let mut collector = PatternCollector::new();
    for (label, text) in patterns {
        collector = collector.with_pattern(*label, parse_pattern(text, &sc)?);
    }
    StreamDriver::default().run(xml, &mut Context::new(), &mut collector)?;
    Ok(collector)
}

/// Streams `xml` and calls `f` for every node with its stack index.
pub fn for_each_node<F>(xml: &str, ctx: &mut Context, f: F) -> Result<(), SourceError>
where
    F: FnMut(&mut Context, usize) -> Result<(), SourceError>,
{
    struct Visitor<F>(F);

    impl<F> stx_engine::StreamHandler for Visitor<F>
    where
        F: FnMut(&mut Context, usize) -> Result<(), SourceError>,
    {
        fn node(&mut self, ctx: &mut Context) -> Result<(), SourceError> {
            let top = ctx.depth();
            (self.0)(ctx, top)
        }
    }

    StreamDriver::default().run(xml, ctx, &mut Visitor(f))
}

pub fn compile(text: &str, registry: &FunctionRegistry) -> Result<Tree, stx_engine::ExprError> {
    stx_engine::parse_expression(text, &StaticContext::new(registry))
}
