use crate::error::ExprError;
use crate::value::Value;

pub fn fn_boolean(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_bool(args.remove(0).to_boolean()))
}

pub fn fn_not(mut args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_bool(!args.remove(0).to_boolean()))
}

pub fn fn_true(_args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_bool(true))
}

pub fn fn_false(_args: Vec<Value>) -> Result<Value, ExprError> {
    Ok(Value::from_bool(false))
}
