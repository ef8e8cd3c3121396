use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Bean 的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 单例模式 - 容器中只有一个实例
    #[default]
    Singleton,

    /// 原型模式 - 每次请求都创建新实例
    Prototype,
}

impl Scope {
    pub fn is_singleton(self) -> bool {
        self == Scope::Singleton
    }

    pub fn is_prototype(self) -> bool {
        self == Scope::Prototype
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "singleton" => Ok(Scope::Singleton),
            "prototype" => Ok(Scope::Prototype),
            other => Err(format!("No Scope registered for scope name '{}'", other)),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => write!(f, "singleton"),
            Scope::Prototype => write!(f, "prototype"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_str() {
        assert_eq!("singleton".parse::<Scope>().unwrap(), Scope::Singleton);
        assert_eq!("Prototype".parse::<Scope>().unwrap(), Scope::Prototype);
        assert_eq!("".parse::<Scope>().unwrap(), Scope::Singleton);
        assert!("request".parse::<Scope>().is_err());
    }

    #[test]
    fn test_default_scope_is_singleton() {
        assert_eq!(Scope::default(), Scope::Singleton);
    }
}
