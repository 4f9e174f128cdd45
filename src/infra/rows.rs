use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Map, Value};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use tracing::debug;

pub fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

// 类型不匹配时该列按 null 输出，但要留下日志
fn decoded<T>(name: &str, value: Result<Option<T>, sqlx::Error>) -> Option<T> {
    value.unwrap_or_else(|e| {
        debug!("列 {} 解码失败，按 null 处理: {}", name, e);
        None
    })
}

// 核心转换函数：按数据库原生类型把一行转成 JSON 对象
pub fn pg_row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();

    for col in row.columns() {
        let name = col.name();
        let type_info = col.type_info();
        let type_name = type_info.name(); // 数据库原生类型名，如 "INT4", "NUMERIC"

        let val = match type_name {
            "INT2" | "INT4" => json!(decoded(name, row.try_get::<Option<i32>, _>(name))),
            "INT8" => json!(decoded(name, row.try_get::<Option<i64>, _>(name))),
            "FLOAT4" => json!(decoded(name, row.try_get::<Option<f32>, _>(name))),
            "FLOAT8" => json!(decoded(name, row.try_get::<Option<f64>, _>(name))),
            "NUMERIC" => {
                let v: Option<rust_decimal::Decimal> = decoded(name, row.try_get(name));
                json!(v.and_then(|d| d.to_f64()))
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                json!(decoded(name, row.try_get::<Option<String>, _>(name)))
            }
            "BOOL" => json!(decoded(name, row.try_get::<Option<bool>, _>(name))),
            "DATE" => {
                let v: Option<NaiveDate> = decoded(name, row.try_get(name));
                json!(v.map(|d| d.to_string()))
            }
            "TIMESTAMP" => {
                let v: Option<NaiveDateTime> = decoded(name, row.try_get(name));
                json!(v.map(|dt| dt.to_string()))
            }
            "TIMESTAMPTZ" => {
                let v: Option<DateTime<Utc>> = decoded(name, row.try_get(name));
                json!(v.map(|dt| dt.naive_utc().to_string()))
            }
            "JSON" | "JSONB" => {
                let v: Option<Value> = decoded(name, row.try_get(name));
                v.unwrap_or(Value::Null)
            }
            _ => {
                // 未知类型，尝试转为字符串
                json!(decoded(name, row.try_get::<Option<String>, _>(name)))
            }
        };
        map.insert(name.to_string(), val);
    }

    Value::Object(map)
}

pub fn mysql_row_to_json(row: &MySqlRow) -> Value {
    let mut map = Map::new();

    for col in row.columns() {
        let name = col.name();
        let type_info = col.type_info();
        let type_name = type_info.name(); // 如 "INT", "DECIMAL", "VARCHAR", "DATE"

        let val = match type_name {
            "TINYINT" | "SMALLINT" | "INT" | "MEDIUMINT" => {
                let v: Option<i32> = decoded(name, row.try_get(name));
                json!(v)
            }
            "BIGINT" => {
                let v: Option<i64> = decoded(name, row.try_get(name));
                json!(v)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "INT UNSIGNED" | "MEDIUMINT UNSIGNED"
            | "BIGINT UNSIGNED" => {
                let v: Option<u64> = decoded(name, row.try_get(name));
                json!(v)
            }
            "FLOAT" => {
                let v: Option<f32> = decoded(name, row.try_get(name));
                json!(v)
            }
            "DOUBLE" => {
                let v: Option<f64> = decoded(name, row.try_get(name));
                json!(v)
            }
            "BOOLEAN" => {
                let v: Option<bool> = decoded(name, row.try_get(name));
                json!(v)
            }
            "DECIMAL" | "NEWDECIMAL" => {
                let v: Option<rust_decimal::Decimal> = decoded(name, row.try_get(name));
                json!(v.and_then(|d| d.to_f64()))
            }
            "CHAR" | "VARCHAR" | "TEXT" | "LONGTEXT" => {
                let v: Option<String> = decoded(name, row.try_get(name));
                json!(v)
            }
            "DATE" => {
                let v: Option<NaiveDate> = decoded(name, row.try_get(name));
                json!(v.map(|d| d.to_string()))
            }
            "DATETIME" | "TIMESTAMP" => {
                let v: Option<NaiveDateTime> = decoded(name, row.try_get(name));
                json!(v.map(|dt| dt.to_string()))
            }
            "JSON" => {
                let v: Option<Value> = decoded(name, row.try_get(name));
                v.unwrap_or(Value::Null)
            }
            _ => {
                let v: Option<String> = decoded(name, row.try_get(name));
                json!(v)
            }
        };

        map.insert(name.to_string(), val);
    }

    Value::Object(map)
}
