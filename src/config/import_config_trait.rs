// ==========================================
// 物料盘点导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/对账/地理定位所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 地理编码 =====

    /// 获取地理编码服务 API Key
    ///
    /// # 返回
    /// - None: 未配置（地理编码关闭,导入时记录错误诊断）
    async fn get_google_api_key(&self) -> ConfigResult<Option<String>>;

    /// 地理编码结果语言
    ///
    /// # 默认值
    /// - fr
    async fn get_geocode_language(&self) -> ConfigResult<String>;

    /// 地理编码区域偏好
    ///
    /// # 默认值
    /// - fr
    async fn get_geocode_region(&self) -> ConfigResult<String>;

    /// 地理编码请求超时（秒）
    ///
    /// # 默认值
    /// - 10
    async fn get_geocode_timeout_secs(&self) -> ConfigResult<u64>;

    /// IRIS 边界数据集（GeoJSON）路径
    ///
    /// # 返回
    /// - None: 未配置（跳过 IRIS 查询）
    async fn get_iris_geojson_path(&self) -> ConfigResult<Option<String>>;

    // ===== 提取 =====

    /// 物料页表头偏移（数据从下一行开始）
    ///
    /// # 默认值
    /// - 14
    async fn get_materials_header_row(&self) -> ConfigResult<u32>;

    // ===== 对账 =====

    /// 物料缺省价格
    ///
    /// # 默认值
    /// - 1
    async fn get_default_price(&self) -> ConfigResult<String>;

    /// 新建供应方分类项的颜色
    ///
    /// # 默认值
    /// - blue
    async fn get_provider_term_color(&self) -> ConfigResult<String>;
}
