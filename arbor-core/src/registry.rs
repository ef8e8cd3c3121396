//! Bean 定义注册表
//!
//! 名称到 `BeanDefinition` 的映射，以及别名到规范名称的多对一映射。
//! 注册表本身不加锁，由 `DefaultListableBeanFactory` 持有并在 `RwLock` 下访问。

use std::collections::HashMap;
use std::sync::Arc;

use crate::bean::BeanDefinition;
use crate::error::{BeansError, BeansResult};

/// BeanDefinitionRegistry - 定义注册表接口
///
/// 对外的注册入口，`DefaultListableBeanFactory` 实现此 trait
pub trait BeanDefinitionRegistry: Send + Sync {
    /// 注册 Bean 定义，同时注册定义上声明的别名
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()>;

    /// 移除 Bean 定义
    fn remove_bean_definition(&self, name: &str) -> BeansResult<()>;

    /// 获取 Bean 定义（解析别名）
    fn get_bean_definition(&self, name: &str) -> BeansResult<Arc<BeanDefinition>>;

    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 按注册顺序返回所有定义名称
    fn get_bean_definition_names(&self) -> Vec<String>;

    fn get_bean_definition_count(&self) -> usize;

    fn register_alias(&self, name: &str, alias: &str) -> BeansResult<()>;

    fn remove_alias(&self, alias: &str) -> BeansResult<()>;

    fn is_alias(&self, name: &str) -> bool;
}

/// 注册表存储
#[derive(Default)]
pub(crate) struct DefinitionStore {
    definitions: HashMap<String, Arc<BeanDefinition>>,
    names: Vec<String>,
    /// alias -> 目标名称（目标本身也可能是别名）
    aliases: HashMap<String, String>,
    alias_order: Vec<String>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册定义，返回被覆盖的旧定义
    pub fn register(
        &mut self,
        name: &str,
        definition: BeanDefinition,
        allow_override: bool,
    ) -> BeansResult<Option<Arc<BeanDefinition>>> {
        if name.trim().is_empty() {
            return Err(BeansError::store(name, "bean name must not be empty"));
        }
        definition.validate(name)?;

        if self.aliases.contains_key(name) {
            return Err(BeansError::store(
                name,
                format!(
                    "name is already registered as an alias for '{}'",
                    self.canonical_name(name)
                ),
            ));
        }

        let existing = self.definitions.get(name).cloned();
        if existing.is_some() && !allow_override {
            return Err(BeansError::store(
                name,
                "a bean definition with this name is already registered and overriding is disabled",
            ));
        }

        // 先检查所有别名，避免注册一半
        for alias in &definition.aliases {
            self.check_alias(name, alias, allow_override)?;
        }

        let aliases = definition.aliases.clone();
        self.definitions
            .insert(name.to_string(), Arc::new(definition));
        if existing.is_none() {
            self.names.push(name.to_string());
        }
        for alias in aliases {
            self.insert_alias(name, &alias);
        }

        Ok(existing)
    }

    pub fn remove(&mut self, name: &str) -> BeansResult<Arc<BeanDefinition>> {
        let removed = self
            .definitions
            .remove(name)
            .ok_or_else(|| BeansError::no_such_bean(name))?;
        self.names.retain(|n| n != name);
        Ok(removed)
    }

    /// 解析别名链，返回规范名称（不存在的名称原样返回）
    pub fn canonical_name(&self, name: &str) -> String {
        let mut current = name;
        // 注册时已拒绝成环
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(current) {
                Some(target) => current = target,
                None => break,
            }
        }
        current.to_string()
    }

    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.get(&self.canonical_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(&self.canonical_name(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.names.clone()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// 按注册顺序遍历（名称, 定义）
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<BeanDefinition>)> {
        self.names
            .iter()
            .filter_map(|name| self.definitions.get(name).map(|def| (name, def)))
    }

    pub fn register_alias(&mut self, name: &str, alias: &str, allow_override: bool) -> BeansResult<()> {
        if alias == name {
            self.aliases.remove(alias);
            self.alias_order.retain(|a| a != alias);
            return Ok(());
        }
        self.check_alias(name, alias, allow_override)?;
        self.insert_alias(name, alias);
        Ok(())
    }

    pub fn remove_alias(&mut self, alias: &str) -> BeansResult<()> {
        if self.aliases.remove(alias).is_none() {
            return Err(BeansError::store(alias, "no alias registered under this name"));
        }
        self.alias_order.retain(|a| a != alias);
        Ok(())
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let canonical = self.canonical_name(name);
        self.alias_order
            .iter()
            .filter(|alias| alias.as_str() != name && self.canonical_name(alias) == canonical)
            .cloned()
            .collect()
    }

    fn check_alias(&self, name: &str, alias: &str, allow_override: bool) -> BeansResult<()> {
        if alias.trim().is_empty() {
            return Err(BeansError::store(name, "alias must not be empty"));
        }
        if alias == name {
            return Err(BeansError::store(name, "alias must differ from the bean name"));
        }
        if self.definitions.contains_key(alias) {
            return Err(BeansError::store(
                alias,
                format!("cannot register alias for '{}': a bean definition uses this name", name),
            ));
        }
        if let Some(existing) = self.aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            if !allow_override {
                return Err(BeansError::store(
                    alias,
                    format!(
                        "cannot register alias for '{}': already registered for '{}'",
                        name, existing
                    ),
                ));
            }
        }
        if self.resolves_through(name, alias) {
            return Err(BeansError::store(
                alias,
                format!("circular reference: '{}' is a direct or indirect alias for '{}'", name, alias),
            ));
        }
        Ok(())
    }

    /// 从 `name` 出发沿别名链是否会经过 `alias`
    fn resolves_through(&self, name: &str, alias: &str) -> bool {
        let mut current = name;
        for _ in 0..=self.aliases.len() {
            if current == alias {
                return true;
            }
            match self.aliases.get(current) {
                Some(target) => current = target,
                None => return false,
            }
        }
        true
    }

    fn insert_alias(&mut self, name: &str, alias: &str) {
        if self
            .aliases
            .insert(alias.to_string(), name.to_string())
            .is_none()
        {
            self.alias_order.push(alias.to_string());
        }
    }
}
