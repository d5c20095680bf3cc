//! The function registry and the builtin function library.
//!
//! Names are resolved against the registry once, when an expression is
//! compiled. The resulting `Tree` holds the `Function` itself, so evaluation
//! never consults the registry again.

mod boolean;
mod extension;
mod node;
mod numeric;
mod regex;
mod sequence;
mod string;

pub use extension::{ExtensionClass, ReflectiveExtension, ScriptEngine};

use crate::context::Context;
use crate::error::{ExprError, SourceLocation};
use crate::name::ExpandedName;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Namespace of the builtin functions; unprefixed calls resolve into it.
pub const STX_FUNCTIONS_NS: &str = "http://stx.sourceforge.net/2002/ns";

/// Calls in `urn:stx:class:<Class>` dispatch to a reflective extension.
pub const CLASS_NS_PREFIX: &str = "urn:stx:class:";

pub type FunctionImpl = dyn Fn(&mut Context, usize, Vec<Value>) -> Result<Value, ExprError>;

pub struct Function {
    name: ExpandedName,
    min_args: usize,
    max_args: Option<usize>,
    is_constant: bool,
    string_result: bool,
    implementation: Rc<FunctionImpl>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("is_constant", &self.is_constant)
            .finish()
    }
}

impl Function {
    /// A function with access to the context and the stack position it is
    /// evaluated at.
    pub fn new<F>(name: ExpandedName, min_args: usize, max_args: Option<usize>, f: F) -> Self
    where
        F: Fn(&mut Context, usize, Vec<Value>) -> Result<Value, ExprError> + 'static,
    {
        Self {
            name,
            min_args,
            max_args,
            is_constant: false,
            string_result: false,
            implementation: Rc::new(f),
        }
    }

    /// Marks the result as depending only on the arguments.
    pub fn constant(mut self) -> Self {
        self.is_constant = true;
        self
    }

    /// Marks the function as string-valued; its error fallback is `""`.
    pub fn string_result(mut self) -> Self {
        self.string_result = true;
        self
    }

    pub fn name(&self) -> &ExpandedName {
        &self.name
    }

    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    pub fn accepts(&self, arg_count: usize) -> bool {
        arg_count >= self.min_args && self.max_args.is_none_or(|max| arg_count <= max)
    }

    pub fn expected_arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }

    /// The value a failing call yields when the error sink lets evaluation
    /// continue.
    pub fn fallback(&self) -> Value {
        if self.string_result {
            Value::from_string("")
        } else {
            Value::empty()
        }
    }

    pub fn call(&self, ctx: &mut Context, top: usize, args: Vec<Value>) -> Result<Value, ExprError> {
        if !self.accepts(args.len()) {
            return Err(ExprError::Internal(format!(
                "{} called with {} argument(s), expects {}",
                self.name,
                args.len(),
                self.expected_arity()
            )));
        }
        (self.implementation)(ctx, top, args)
    }
}

type PureFn = fn(Vec<Value>) -> Result<Value, ExprError>;
type ContextFn = fn(&mut Context, usize, Vec<Value>) -> Result<Value, ExprError>;

fn pure(local: &str, min: usize, max: Option<usize>, f: PureFn) -> Function {
    Function::new(ExpandedName::new(STX_FUNCTIONS_NS, local), min, max, move |_, _, args| f(args))
        .constant()
}

fn contextual(local: &str, min: usize, max: Option<usize>, f: ContextFn) -> Function {
    Function::new(ExpandedName::new(STX_FUNCTIONS_NS, local), min, max, f)
}

/// Maps expanded names to functions. There is no global registry; a host
/// builds one and hands it to every compilation.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<ExpandedName, Rc<Function>>,
    classes: HashMap<String, Rc<dyn ReflectiveExtension>>,
    scripts: HashMap<String, Rc<dyn ScriptEngine>>,
    allow_external_functions: bool,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .field("allow_external_functions", &self.allow_external_functions)
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for function in builtins() {
            registry.register(function);
        }
        log::debug!("Registered {} builtin functions", registry.functions.len());
        registry
    }

    pub fn allow_external_functions(&mut self, allow: bool) -> &mut Self {
        self.allow_external_functions = allow;
        self
    }

    pub fn external_functions_allowed(&self) -> bool {
        self.allow_external_functions
    }

    /// Adds or replaces a function under its expanded name.
    pub fn register(&mut self, function: Function) {
        self.functions
            .insert(function.name().clone(), Rc::new(function));
    }

    pub fn get(&self, name: &ExpandedName) -> Option<&Rc<Function>> {
        self.functions.get(name)
    }

    /// Binds a reflective extension to `urn:stx:class:<class name>`.
    pub fn register_class(&mut self, class: Rc<dyn ReflectiveExtension>) -> Result<(), ExprError> {
        let name = class.class_name().to_string();
        if !self.allow_external_functions {
            return Err(ExprError::ExternalFunctionsDisabled {
                name: format!("{}{}", CLASS_NS_PREFIX, name),
            });
        }
        log::debug!("Registered extension class '{}'", name);
        self.classes.insert(name, class);
        Ok(())
    }

    /// Binds a script engine to the namespace `uri`.
    pub fn register_script(
        &mut self,
        uri: impl Into<String>,
        engine: Rc<dyn ScriptEngine>,
    ) -> Result<(), ExprError> {
        let uri = uri.into();
        if !self.allow_external_functions {
            return Err(ExprError::ExternalFunctionsDisabled { name: uri });
        }
        log::debug!("Registered {} script engine for '{}'", engine.language(), uri);
        self.scripts.insert(uri, engine);
        Ok(())
    }

    /// Finds the function a call with `arg_count` arguments refers to.
    pub fn resolve(
        &self,
        name: &ExpandedName,
        arg_count: usize,
        location: &SourceLocation,
    ) -> Result<Rc<Function>, ExprError> {
        let function = match self.functions.get(name) {
            Some(f) => f.clone(),
            None => self.resolve_external(name, location)?,
        };
        if !function.accepts(arg_count) {
            return Err(ExprError::WrongArity {
                name: name.to_string(),
                expected: function.expected_arity(),
                actual: arg_count,
                location: location.clone(),
            });
        }
        Ok(function)
    }

    fn resolve_external(
        &self,
        name: &ExpandedName,
        location: &SourceLocation,
    ) -> Result<Rc<Function>, ExprError> {
        let unknown = || ExprError::UnknownFunction {
            name: name.to_string(),
            location: location.clone(),
        };
        let is_external =
            name.uri.starts_with(CLASS_NS_PREFIX) || self.scripts.contains_key(&name.uri);
        if !is_external {
            return Err(unknown());
        }
        if !self.allow_external_functions {
            return Err(ExprError::ExternalFunctionsDisabled {
                name: name.to_string(),
            });
        }
        if let Some(class_name) = name.uri.strip_prefix(CLASS_NS_PREFIX) {
            let class = self.classes.get(class_name).ok_or_else(unknown)?;
            if !class.has_method(&name.local_name) {
                return Err(unknown());
            }
            return Ok(Rc::new(extension::class_method(name.clone(), class.clone())));
        }
        let engine = self.scripts.get(&name.uri).ok_or_else(unknown)?;
        if !engine.has_function(&name.local_name) {
            return Err(unknown());
        }
        Ok(Rc::new(extension::script_function(name.clone(), engine.clone())))
    }
}

fn builtins() -> Vec<Function> {
    let one = Some(1);
    vec![
        // Conversions and booleans
        contextual("string", 0, one, string::fn_string).string_result(),
        contextual("number", 0, one, numeric::fn_number),
        pure("boolean", 1, one, boolean::fn_boolean),
        pure("not", 1, one, boolean::fn_not),
        pure("true", 0, Some(0), boolean::fn_true),
        pure("false", 0, Some(0), boolean::fn_false),
        contextual("position", 0, Some(0), sequence::fn_position),
        // Sequences
        pure("count", 1, one, sequence::fn_count),
        pure("sum", 1, one, numeric::fn_sum),
        pure("min", 1, one, numeric::fn_min),
        pure("max", 1, one, numeric::fn_max),
        pure("avg", 1, one, numeric::fn_avg),
        pure("empty", 1, one, sequence::fn_empty),
        pure("exists", 1, one, sequence::fn_exists),
        pure("index-of", 2, Some(2), sequence::fn_index_of),
        pure("subsequence", 2, Some(3), sequence::fn_subsequence),
        pure("item-at", 2, Some(2), sequence::fn_item_at),
        pure("insert-before", 3, Some(3), sequence::fn_insert_before),
        pure("remove", 2, Some(2), sequence::fn_remove),
        pure("reverse", 1, one, sequence::fn_reverse),
        // Strings
        pure("concat", 2, None, string::fn_concat).string_result(),
        pure("string-join", 2, Some(2), string::fn_string_join).string_result(),
        contextual("string-length", 0, one, string::fn_string_length),
        contextual("normalize-space", 0, one, string::fn_normalize_space).string_result(),
        pure("substring", 2, Some(3), string::fn_substring).string_result(),
        pure("substring-before", 2, Some(2), string::fn_substring_before).string_result(),
        pure("substring-after", 2, Some(2), string::fn_substring_after).string_result(),
        pure("starts-with", 2, Some(2), string::fn_starts_with),
        pure("ends-with", 2, Some(2), string::fn_ends_with),
        pure("contains", 2, Some(2), string::fn_contains),
        pure("translate", 3, Some(3), string::fn_translate).string_result(),
        pure("upper-case", 1, one, string::fn_upper_case).string_result(),
        pure("lower-case", 1, one, string::fn_lower_case).string_result(),
        pure("string-pad", 2, Some(2), string::fn_string_pad).string_result(),
        pure("tokenize", 2, Some(3), regex::fn_tokenize),
        pure("matches", 2, Some(3), regex::fn_matches),
        pure("replace", 3, Some(4), regex::fn_replace).string_result(),
        // Numbers
        pure("floor", 1, one, numeric::fn_floor),
        pure("ceiling", 1, one, numeric::fn_ceiling),
        pure("round", 1, one, numeric::fn_round),
        // Nodes
        contextual("name", 0, one, node::fn_name).string_result(),
        contextual("local-name", 0, one, node::fn_local_name).string_result(),
        contextual("namespace-uri", 0, one, node::fn_namespace_uri).string_result(),
        contextual("node-kind", 0, one, node::fn_node_kind).string_result(),
        contextual(
            "get-namespace-uri-for-prefix",
            2,
            Some(2),
            node::fn_get_namespace_uri_for_prefix,
        ),
        contextual("get-in-scope-prefixes", 1, one, node::fn_get_in_scope_prefixes),
    ]
}
