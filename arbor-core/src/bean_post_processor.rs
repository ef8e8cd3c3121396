//! BeanPostProcessor - Bean 工厂扩展机制
//!
//! 提供在 Bean 初始化前后进行自定义处理的钩子，类似 Spring 的 BeanPostProcessor

use crate::bean::BeanInstance;

/// BeanPostProcessor trait
///
/// 在 Bean 初始化的不同阶段提供钩子，允许自定义修改 Bean 实例
///
/// 两个钩子都按注册顺序调用（after 阶段不会反转顺序）。
/// 钩子拿到实例的所有权，可以原样返回、就地修改，或者返回替代对象。
///
/// 使用场景：
/// - Bean 包装
/// - 属性增强
/// - 验证等
///
/// # 示例
///
/// ```
/// use arbor_core::prelude::*;
///
/// struct AuditPostProcessor;
///
/// impl BeanPostProcessor for AuditPostProcessor {
///     fn post_process_after_initialization(
///         &self,
///         bean: BeanInstance,
///         bean_name: &str,
///     ) -> anyhow::Result<BeanInstance> {
///         tracing::info!("After initialization: {}", bean_name);
///         Ok(bean)
///     }
/// }
/// ```
pub trait BeanPostProcessor: Send + Sync {
    /// 在 Bean 初始化回调（init）之前调用
    ///
    /// # 参数
    /// - `bean`: Bean 实例（属性已填充，Aware 回调已完成）
    /// - `bean_name`: Bean 的名称
    ///
    /// # 返回
    /// 返回处理后的 Bean 实例（可以是原始 Bean，也可以是包装后的 Bean）
    fn post_process_before_initialization(
        &self,
        bean: BeanInstance,
        _bean_name: &str,
    ) -> anyhow::Result<BeanInstance> {
        Ok(bean)
    }

    /// 在 Bean 初始化回调（init）之后调用
    ///
    /// FactoryBean 的产品也会经过此钩子
    fn post_process_after_initialization(
        &self,
        bean: BeanInstance,
        _bean_name: &str,
    ) -> anyhow::Result<BeanInstance> {
        Ok(bean)
    }

    /// 获取处理器的名称（用于日志和调试）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }
}
