use std::fmt;

use serde::de::{Error as DeError, Visitor};
use serde::{Deserializer, Serializer};

/// 聚合服务对金额字段的写法不统一，字符串与整数都接受，输出统一为字符串。
pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an unsigned integer or a decimal string of one")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(value)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        u64::try_from(value).map_err(|_| E::custom(format!("negative amount {value}")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        value
            .trim()
            .parse::<u64>()
            .map_err(|err| E::custom(format!("invalid amount `{value}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(with = "super")]
        amount: u64,
    }

    #[test]
    fn accepts_both_forms() {
        let a: Holder = serde_json::from_str(r#"{"amount":"1500000"}"#).expect("string");
        let b: Holder = serde_json::from_str(r#"{"amount":1500000}"#).expect("number");
        assert_eq!(a.amount, 1_500_000);
        assert_eq!(b.amount, 1_500_000);
        assert!(serde_json::from_str::<Holder>(r#"{"amount":-1}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"amount":"1.5"}"#).is_err());
    }
}
