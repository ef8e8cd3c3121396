//! 已解析的依赖值
//!
//! 构造参数和属性描述符在解析后都变成 `BeanValue`：字面量原样传递，
//! 引用解析为容器中的共享实例。

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail};

use crate::bean::BeanDefinition;

/// 容器持有的共享 Bean 实例
pub type SharedBean = Arc<dyn Any + Send + Sync>;

/// 已解析的值
#[derive(Clone)]
pub enum BeanValue {
    /// 缺失的可选依赖
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<BeanValue>),
    /// 引用或内部 Bean 解析出的实例，附带目标定义（提供 `assignable_to` 声明的接口视图）
    Bean(SharedBean, Option<Arc<BeanDefinition>>),
}

impl BeanValue {
    /// 不带定义的 Bean 值，只能按具体类型取出
    pub fn bean<T: Any + Send + Sync>(bean: Arc<T>) -> Self {
        BeanValue::Bean(bean, None)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BeanValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BeanValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BeanValue::Int(i) => Some(*i),
            BeanValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BeanValue::Float(f) => Some(*f),
            BeanValue::Int(i) => Some(*i as f64),
            BeanValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BeanValue::Bool(b) => Some(*b),
            BeanValue::Str(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// 转换为字符串表示（Bean 实例除外）
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            BeanValue::Str(s) => Some(s.clone()),
            BeanValue::Int(i) => Some(i.to_string()),
            BeanValue::Float(f) => Some(f.to_string()),
            BeanValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 尝试将 Bean 实例向下转型为具体类型
    pub fn as_bean<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            BeanValue::Bean(bean, _) => Arc::clone(bean).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn as_shared(&self) -> Option<&SharedBean> {
        match self {
            BeanValue::Bean(bean, _) => Some(bean),
            _ => None,
        }
    }

    /// 取出 Bean 实例，类型不符或为空时报错
    pub fn into_bean<T: Any + Send + Sync>(self) -> anyhow::Result<Arc<T>> {
        match self {
            BeanValue::Bean(bean, _) => bean.downcast::<T>().map_err(|_| {
                anyhow!(
                    "injected bean is not of type '{}'",
                    std::any::type_name::<T>()
                )
            }),
            BeanValue::Null => bail!(
                "required bean of type '{}' resolved to null",
                std::any::type_name::<T>()
            ),
            other => bail!(
                "expected a bean of type '{}' but found literal {:?}",
                std::any::type_name::<T>(),
                other
            ),
        }
    }

    /// 以接口视图取出 Bean 实例，`I` 必须由目标定义通过 `assignable_to` 声明
    pub fn into_bean_as<I: ?Sized + 'static>(self) -> anyhow::Result<Arc<I>> {
        match self {
            BeanValue::Bean(bean, definition) => definition
                .as_deref()
                .and_then(|definition| definition.find_assignable(TypeId::of::<I>()))
                .and_then(|assignable| assignable.cast(&bean))
                .and_then(|boxed| boxed.downcast::<Arc<I>>().ok())
                .map(|arc| *arc)
                .ok_or_else(|| {
                    anyhow!(
                        "injected bean is not assignable to '{}'",
                        std::any::type_name::<I>()
                    )
                }),
            BeanValue::Null => bail!(
                "required bean of type '{}' resolved to null",
                std::any::type_name::<I>()
            ),
            other => bail!(
                "expected a bean of type '{}' but found literal {:?}",
                std::any::type_name::<I>(),
                other
            ),
        }
    }

    /// 可选依赖：`Null` 映射为 `None`
    pub fn into_optional_bean<T: Any + Send + Sync>(self) -> anyhow::Result<Option<Arc<T>>> {
        if self.is_null() {
            return Ok(None);
        }
        self.into_bean().map(Some)
    }

    pub(crate) fn type_id_of_bean(&self) -> Option<TypeId> {
        match self {
            BeanValue::Bean(bean, _) => Some((**bean).type_id()),
            _ => None,
        }
    }
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Null => write!(f, "null"),
            BeanValue::Bool(b) => write!(f, "{}", b),
            BeanValue::Int(i) => write!(f, "{}", i),
            BeanValue::Float(v) => write!(f, "{}", v),
            BeanValue::Str(s) => write!(f, "{:?}", s),
            BeanValue::List(items) => f.debug_list().entries(items).finish(),
            BeanValue::Bean(..) => write!(f, "<bean>"),
        }
    }
}

impl From<&str> for BeanValue {
    fn from(value: &str) -> Self {
        BeanValue::Str(value.to_string())
    }
}

impl From<String> for BeanValue {
    fn from(value: String) -> Self {
        BeanValue::Str(value)
    }
}

impl From<i64> for BeanValue {
    fn from(value: i64) -> Self {
        BeanValue::Int(value)
    }
}

impl From<i32> for BeanValue {
    fn from(value: i32) -> Self {
        BeanValue::Int(value as i64)
    }
}

impl From<f64> for BeanValue {
    fn from(value: f64) -> Self {
        BeanValue::Float(value)
    }
}

impl From<bool> for BeanValue {
    fn from(value: bool) -> Self {
        BeanValue::Bool(value)
    }
}

impl<V: Into<BeanValue>> From<Vec<V>> for BeanValue {
    fn from(values: Vec<V>) -> Self {
        BeanValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// 传给构造函数 / 工厂方法的已解析参数
///
/// 按位置访问，或通过 `find_bean` 按类型匹配
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<BeanValue>,
}

impl Arguments {
    pub fn new(values: Vec<BeanValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[BeanValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> anyhow::Result<&BeanValue> {
        self.values.get(index).ok_or_else(|| {
            anyhow!(
                "constructor argument index {} out of range ({} argument(s) resolved)",
                index,
                self.values.len()
            )
        })
    }

    pub fn bean<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        self.get(index)?
            .clone()
            .into_bean()
            .map_err(|e| e.context(format!("constructor argument {}", index)))
    }

    pub fn bean_as<I: ?Sized + 'static>(&self, index: usize) -> anyhow::Result<Arc<I>> {
        self.get(index)?
            .clone()
            .into_bean_as()
            .map_err(|e| e.context(format!("constructor argument {}", index)))
    }

    pub fn optional_bean<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Option<Arc<T>>> {
        match self.values.get(index) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .into_optional_bean()
                .map_err(|e| e.context(format!("constructor argument {}", index))),
        }
    }

    pub fn string(&self, index: usize) -> anyhow::Result<String> {
        let value = self.get(index)?;
        value
            .to_string_value()
            .ok_or_else(|| anyhow!("constructor argument {} is not a string: {:?}", index, value))
    }

    pub fn int(&self, index: usize) -> anyhow::Result<i64> {
        let value = self.get(index)?;
        value
            .as_i64()
            .ok_or_else(|| anyhow!("constructor argument {} is not an integer: {:?}", index, value))
    }

    pub fn float(&self, index: usize) -> anyhow::Result<f64> {
        let value = self.get(index)?;
        value
            .as_f64()
            .ok_or_else(|| anyhow!("constructor argument {} is not a number: {:?}", index, value))
    }

    pub fn boolean(&self, index: usize) -> anyhow::Result<bool> {
        let value = self.get(index)?;
        value
            .as_bool()
            .ok_or_else(|| anyhow!("constructor argument {} is not a boolean: {:?}", index, value))
    }

    /// 按类型匹配：返回第一个可以转型为 `T` 的 Bean 参数
    pub fn find_bean<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        let wanted = TypeId::of::<T>();
        self.values
            .iter()
            .find(|v| v.type_id_of_bean() == Some(wanted))
            .and_then(|v| v.as_bean::<T>())
            .ok_or_else(|| {
                anyhow!(
                    "no constructor argument of type '{}'",
                    std::any::type_name::<T>()
                )
            })
    }
}
