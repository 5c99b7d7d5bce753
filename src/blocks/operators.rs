//! Operator reporters

use std::cmp::Ordering;

use super::{Args, Primitive};
use crate::errors::BlockError;
use crate::runtime::BlockUtility;
use crate::value::{self, Value};

type BlockResult = Result<Option<Value>, BlockError>;

pub fn primitives() -> Vec<(&'static str, Primitive)> {
    vec![
        ("operator_add", add as Primitive),
        ("operator_subtract", subtract),
        ("operator_multiply", multiply),
        ("operator_equals", equals),
        ("operator_lt", less_than),
        ("operator_gt", greater_than),
        ("operator_and", and),
        ("operator_or", or),
        ("operator_not", not),
        ("operator_join", join),
    ]
}

/* ===================== Arithmetic ===================== */

fn add(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Num(args.number("NUM1") + args.number("NUM2"))))
}

fn subtract(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Num(args.number("NUM1") - args.number("NUM2"))))
}

fn multiply(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Num(args.number("NUM1") * args.number("NUM2"))))
}

/* ===================== Comparison ===================== */

fn compare_operands(args: &Args) -> Ordering {
    value::compare(&args.value("OPERAND1"), &args.value("OPERAND2"))
}

fn equals(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Bool(compare_operands(args) == Ordering::Equal)))
}

fn less_than(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Bool(compare_operands(args) == Ordering::Less)))
}

fn greater_than(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Bool(compare_operands(args) == Ordering::Greater)))
}

/* ===================== Logic ===================== */

fn and(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Bool(args.boolean("OPERAND1") && args.boolean("OPERAND2"))))
}

fn or(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Bool(args.boolean("OPERAND1") || args.boolean("OPERAND2"))))
}

fn not(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Bool(!args.boolean("OPERAND"))))
}

fn join(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Str(args.string("STRING1") + &args.string("STRING2"))))
}
