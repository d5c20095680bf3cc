//! Contracts for functions supplied by the host: reflective classes and
//! script engines. Both are only reachable when the registry allows external
//! functions.

use super::Function;
use crate::error::ExprError;
use crate::name::ExpandedName;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A class whose named methods are callable as `{urn:stx:class:Class}method(...)`.
/// An `Object` receiver, when needed, is passed as the first argument.
pub trait ReflectiveExtension {
    fn class_name(&self) -> &str;
    fn has_method(&self, name: &str) -> bool;
    fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, String>;
}

/// A script engine bound to a namespace URI; `{uri}f(...)` calls `f`.
pub trait ScriptEngine {
    fn language(&self) -> &str;

    fn has_function(&self, _name: &str) -> bool {
        true
    }

    fn call(&self, function: &str, args: Vec<Value>) -> Result<Value, String>;
}

type Method = dyn Fn(Vec<Value>) -> Result<Value, String>;

/// A `ReflectiveExtension` backed by a table of closures.
pub struct ExtensionClass {
    name: String,
    methods: HashMap<String, Box<Method>>,
}

impl fmt::Debug for ExtensionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionClass")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExtensionClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + 'static,
    {
        self.methods.insert(name.into(), Box::new(method));
        self
    }
}

impl ReflectiveExtension for ExtensionClass {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, String> {
        match self.methods.get(method) {
            Some(m) => m(args),
            None => Err(format!("no method '{}' on class '{}'", method, self.name)),
        }
    }
}

pub(super) fn class_method(name: ExpandedName, class: Rc<dyn ReflectiveExtension>) -> Function {
    let method = name.local_name.clone();
    let display = name.to_string();
    Function::new(name, 0, None, move |_, _, args| {
        class
            .invoke(&method, args)
            .map_err(|message| ExprError::function(display.clone(), message))
    })
}

pub(super) fn script_function(name: ExpandedName, engine: Rc<dyn ScriptEngine>) -> Function {
    let function = name.local_name.clone();
    let display = name.to_string();
    Function::new(name, 0, None, move |_, _, args| {
        engine
            .call(&function, args)
            .map_err(|message| ExprError::function(display.clone(), message))
    })
}

#[cfg(test)]
mod tests {
    use super::super::{CLASS_NS_PREFIX, FunctionRegistry};
    use super::*;
    use crate::context::Context;
    use crate::error::SourceLocation;
    use crate::value::HostObject;
    use std::any::Any;

    #[derive(Debug)]
    struct Counter(f64);

    impl HostObject for Counter {
        fn string_value(&self) -> String {
            format!("counter:{}", self.0)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn math_class() -> Rc<dyn ReflectiveExtension> {
        Rc::new(
            ExtensionClass::new("Math")
                .with_method("pow", |args| {
                    let base = args.first().map_or(f64::NAN, Value::to_number);
                    let exp = args.get(1).map_or(f64::NAN, Value::to_number);
                    Ok(Value::from_number(base.powf(exp)))
                })
                .with_method("new-counter", |_| Ok(Value::from_object(Rc::new(Counter(0.0)))))
                .with_method("value", |args| {
                    let counter = args
                        .first()
                        .and_then(|v| match v.first() {
                            Some(crate::value::Item::Object(o)) => {
                                o.as_any().downcast_ref::<Counter>().map(|c| c.0)
                            }
                            _ => None,
                        })
                        .ok_or("receiver is not a counter")?;
                    Ok(Value::from_number(counter))
                }),
        )
    }

    struct Upper;

    impl ScriptEngine for Upper {
        fn language(&self) -> &str {
            "upper"
        }

        fn call(&self, function: &str, args: Vec<Value>) -> Result<Value, String> {
            match function {
                "shout" => Ok(Value::from_string(
                    args.first().map(Value::to_string_value).unwrap_or_default().to_uppercase(),
                )),
                other => Err(format!("unknown script function {}", other)),
            }
        }
    }

    #[test]
    fn test_registration_requires_permission() {
        let mut registry = FunctionRegistry::with_builtins();
        assert!(matches!(
            registry.register_class(math_class()),
            Err(ExprError::ExternalFunctionsDisabled { .. })
        ));
        assert!(registry.register_script("urn:upper", Rc::new(Upper)).is_err());
        let name = ExpandedName::new(format!("{}Math", CLASS_NS_PREFIX), "pow");
        assert!(matches!(
            registry.resolve(&name, 2, &SourceLocation::default()),
            Err(ExprError::ExternalFunctionsDisabled { .. })
        ));
    }

    #[test]
    fn test_reflective_dispatch_with_receiver() {
        let mut registry = FunctionRegistry::with_builtins();
        registry.allow_external_functions(true);
        registry.register_class(math_class()).unwrap();
        let loc = SourceLocation::default();
        let ns = format!("{}Math", CLASS_NS_PREFIX);
        let mut ctx = Context::new();

        let pow = registry.resolve(&ExpandedName::new(ns.clone(), "pow"), 2, &loc).unwrap();
        let result = pow
            .call(&mut ctx, 0, vec![Value::from_number(2.0), Value::from_number(10.0)])
            .unwrap();
        assert_eq!(result, Value::from_number(1024.0));

        let new_counter = registry
            .resolve(&ExpandedName::new(ns.clone(), "new-counter"), 0, &loc)
            .unwrap();
        let counter = new_counter.call(&mut ctx, 0, vec![]).unwrap();
        assert_eq!(counter.to_string_value(), "counter:0");
        let value = registry.resolve(&ExpandedName::new(ns.clone(), "value"), 1, &loc).unwrap();
        assert_eq!(value.call(&mut ctx, 0, vec![counter]).unwrap(), Value::from_number(0.0));
        let err = value.call(&mut ctx, 0, vec![Value::from_number(1.0)]).unwrap_err();
        assert!(err.is_recoverable());

        assert!(matches!(
            registry.resolve(&ExpandedName::new(ns, "missing"), 0, &loc),
            Err(ExprError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_script_dispatch() {
        let mut registry = FunctionRegistry::new();
        registry.allow_external_functions(true);
        registry.register_script("urn:upper", Rc::new(Upper)).unwrap();
        let shout = registry
            .resolve(&ExpandedName::new("urn:upper", "shout"), 1, &SourceLocation::default())
            .unwrap();
        let mut ctx = Context::new();
        assert_eq!(
            shout.call(&mut ctx, 0, vec![Value::from_string("hey")]).unwrap(),
            Value::from_string("HEY")
        );
    }
}
