//! Pre-registered standard library: constants, native methods, and the
//! built-in device classes.
//!
//! Everything here is installed into an environment up front; programs call
//! the natives through `execute_method` like any registered method. Sensor
//! readings are deterministic (a function of the sensor id) so runs are
//! reproducible; actuator writes land in the globals table under an
//! `actuator:` prefix where tests and host code can observe them.

use std::sync::Arc;

use tracing::debug;

use crate::interpreter::env::ExecutionEnvironment;
use crate::interpreter::errors::RuntimeFault;
use crate::memory::value::Value;
use crate::parser::ast::{ClassDef, FieldDef, MethodDef, NativeFn};
use crate::types::{TypeError, TypeKind, TypeSystem};

/// Registers the standard library's constants, methods, and classes into
/// `env`, and the device types into `types`.
pub fn install(env: &ExecutionEnvironment, types: &mut TypeSystem) -> Result<(), TypeError> {
    install_constants(env);
    install_methods(env);
    install_classes(env, types)?;
    debug!("standard library installed");
    Ok(())
}

fn install_constants(env: &ExecutionEnvironment) {
    env.set_global_variable("MAX_INT", Value::Int(i32::MAX));
    env.set_global_variable("MIN_INT", Value::Int(i32::MIN));
}

fn install_methods(env: &ExecutionEnvironment) {
    let abs: NativeFn = Arc::new(|_env, args| Ok(Value::Int(int_arg(args, 0)?.wrapping_abs())));
    env.register_method(MethodDef::new_native(
        "abs",
        vec!["int".to_string()],
        "int",
        abs,
    ));

    let min: NativeFn =
        Arc::new(|_env, args| Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?))));
    env.register_method(MethodDef::new_native(
        "min",
        vec!["int".to_string(), "int".to_string()],
        "int",
        min,
    ));

    let max: NativeFn =
        Arc::new(|_env, args| Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?))));
    env.register_method(MethodDef::new_native(
        "max",
        vec!["int".to_string(), "int".to_string()],
        "int",
        max,
    ));

    let read_sensor: NativeFn =
        Arc::new(|_env, args| Ok(Value::Int(sensor_reading(&str_arg(args, 0)?))));
    env.register_method(MethodDef::new_native(
        "readSensor",
        vec!["String".to_string()],
        "int",
        read_sensor,
    ));

    let set_actuator: NativeFn = Arc::new(|env, args| {
        let id = str_arg(args, 0)?;
        let value = int_arg(args, 1)?;
        env.set_global_variable(format!("actuator:{}", id), Value::Int(value));
        Ok(Value::Null)
    });
    env.register_method(MethodDef::new_native(
        "setActuator",
        vec!["String".to_string(), "int".to_string()],
        "void",
        set_actuator,
    ));

    let current_time: NativeFn =
        Arc::new(|env, _args| Ok(Value::Int(env.epoch().elapsed().as_millis() as i32)));
    env.register_method(MethodDef::new_native(
        "currentTime",
        vec![],
        "int",
        current_time,
    ));

    let sleep: NativeFn = Arc::new(|env, args| {
        let ms = int_arg(args, 0)?;
        if ms > 0 {
            env.interruptible_sleep(ms as u64);
        }
        Ok(Value::Null)
    });
    env.register_method(MethodDef::new_native(
        "sleep",
        vec!["int".to_string()],
        "void",
        sleep,
    ));

    let println: NativeFn = Arc::new(|_env, args| {
        let text = args.first().cloned().unwrap_or(Value::Null);
        println!("{}", text);
        Ok(Value::Null)
    });
    env.register_method(MethodDef::new_native(
        "println",
        vec!["String".to_string()],
        "void",
        println,
    ));
}

fn install_classes(env: &ExecutionEnvironment, types: &mut TypeSystem) -> Result<(), TypeError> {
    types.register_type("Device", TypeKind::Reference)?;
    types.register_type("Sensor", TypeKind::Reference)?;
    types.register_type("Actuator", TypeKind::Reference)?;

    let mut device = ClassDef::new("Device");
    device.add_field(FieldDef::new("id", "String"));
    device.add_field(FieldDef::new("status", "int"));
    let get_status: NativeFn = Arc::new(|_env, _args| Ok(Value::Int(0)));
    device.add_method(MethodDef::new_native("getStatus", vec![], "int", get_status));
    env.register_class(device);

    let mut sensor = ClassDef::new("Sensor");
    sensor.set_superclass("Device");
    sensor.add_field(FieldDef::new("id", "String"));
    sensor.add_field(FieldDef::new("type", "String"));
    let read: NativeFn = Arc::new(|_env, args| Ok(Value::Int(sensor_reading(&str_arg(args, 0)?))));
    sensor.add_method(MethodDef::new_native(
        "read",
        vec!["String".to_string()],
        "int",
        read,
    ));
    env.register_class(sensor);

    let mut actuator = ClassDef::new("Actuator");
    actuator.set_superclass("Device");
    actuator.add_field(FieldDef::new("id", "String"));
    actuator.add_field(FieldDef::new("type", "String"));
    // Same observable effect as the free-standing setActuator.
    let set: NativeFn = Arc::new(|env, args| {
        let id = str_arg(args, 0)?;
        let value = int_arg(args, 1)?;
        env.set_global_variable(format!("actuator:{}", id), Value::Int(value));
        Ok(Value::Null)
    });
    actuator.add_method(MethodDef::new_native(
        "set",
        vec!["String".to_string(), "int".to_string()],
        "void",
        set,
    ));
    env.register_class(actuator);

    Ok(())
}

/// Deterministic pseudo-reading in `0..100`, derived from the sensor id.
fn sensor_reading(id: &str) -> i32 {
    let mut acc: u32 = 17;
    for byte in id.bytes() {
        acc = acc.wrapping_mul(31).wrapping_add(byte as u32);
    }
    (acc % 100) as i32
}

fn int_arg(args: &[Value], index: usize) -> Result<i32, RuntimeFault> {
    match args.get(index) {
        Some(Value::Int(n)) => Ok(*n),
        other => Err(RuntimeFault::TypeMismatch {
            expected: "int".to_string(),
            found: other.map_or("null", |v| v.type_name()).to_string(),
        }),
    }
}

fn str_arg(args: &[Value], index: usize) -> Result<String, RuntimeFault> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        other => Err(RuntimeFault::TypeMismatch {
            expected: "String".to_string(),
            found: other.map_or("null", |v| v.type_name()).to_string(),
        }),
    }
}
