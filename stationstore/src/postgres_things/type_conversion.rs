use std::error::Error;

use bytes::BytesMut;
use chrono::{Local, NaiveDateTime, TimeZone};
use postgres_types::{to_sql_checked, IsNull, ToSql, Type};

use crate::record::{Value, TIMESTAMP_FORMAT};

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

/// A value whose variant cannot be stored in the column it is bound to.
#[derive(Debug, thiserror::Error)]
#[error("cannot store {value:?} in a {column} column")]
pub struct TypeMismatch {
    pub value: Value,
    pub column: Type,
}

fn local_timestamp(text: &str) -> Result<chrono::DateTime<Local>, BoxError> {
    let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{text} does not exist in the local time zone").into())
}

/// Floats only go into integer columns when they hold a whole number in range.
fn whole_number(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl Value {
    fn mismatch(&self, ty: &Type) -> BoxError {
        Box::new(TypeMismatch {
            value: self.clone(),
            column: ty.clone(),
        })
    }

    fn integer_to_sql(&self, i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if *ty == Type::INT2 {
            i16::try_from(i)?.to_sql(ty, out)
        } else if *ty == Type::INT4 {
            i32::try_from(i)?.to_sql(ty, out)
        } else if *ty == Type::INT8 {
            i.to_sql(ty, out)
        } else if *ty == Type::FLOAT4 {
            (i as f32).to_sql(ty, out)
        } else if *ty == Type::FLOAT8 {
            (i as f64).to_sql(ty, out)
        } else {
            Err(self.mismatch(ty))
        }
    }
}

/// Binds a measured value to the type the column declares. Each variant only
/// goes into columns that can hold it; anything else is a `TypeMismatch`.
/// Numbers going into text columns use their delimited-file text.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(_) | Value::Float(_) if is_text(ty) => self.to_field().to_sql(ty, out),
            Value::Integer(i) => self.integer_to_sql(*i, ty, out),
            Value::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    f.to_sql(ty, out)
                } else {
                    match whole_number(*f) {
                        Some(i) => self.integer_to_sql(i, ty, out),
                        None => Err(self.mismatch(ty)),
                    }
                }
            }
            Value::Timestamp(text) => {
                if *ty == Type::TIMESTAMP {
                    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)?.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMPTZ {
                    local_timestamp(text)?.to_sql(ty, out)
                } else if is_text(ty) {
                    text.to_sql(ty, out)
                } else {
                    Err(self.mismatch(ty))
                }
            }
            Value::Text(text) if is_text(ty) => text.to_sql(ty, out),
            Value::Text(_) => Err(self.mismatch(ty)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        is_text(ty)
            || *ty == Type::INT2
            || *ty == Type::INT4
            || *ty == Type::INT8
            || *ty == Type::FLOAT4
            || *ty == Type::FLOAT8
            || *ty == Type::TIMESTAMP
            || *ty == Type::TIMESTAMPTZ
    }

    to_sql_checked!();
}
