//! Variable blocks

use super::{Args, Primitive};
use crate::errors::BlockError;
use crate::runtime::BlockUtility;
use crate::value::{self, Value};

type BlockResult = Result<Option<Value>, BlockError>;

pub fn primitives() -> Vec<(&'static str, Primitive)> {
    vec![
        ("data_setvariableto", set_variable_to as Primitive),
        ("data_changevariableby", change_variable_by),
        ("data_variable", variable),
    ]
}

fn set_variable_to(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.set_variable(&args.string("VARIABLE"), args.value("VALUE"));
    Ok(None)
}

fn change_variable_by(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let name = args.string("VARIABLE");
    let current = value::to_number(&util.variable(&name));
    util.set_variable(&name, Value::Num(current + args.number("VALUE")));
    Ok(None)
}

fn variable(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(util.variable(&args.string("VARIABLE"))))
}
