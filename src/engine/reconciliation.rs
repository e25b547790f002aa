// ==========================================
// 物料盘点导入系统 - 对账引擎
// ==========================================
// 职责: 将抽取结果按自然键写入目录存储（库存点/物料/变体/分类/附件）
// 输入: SiteRecord + MaterialItem 树 + 全局库存更新开关
// 输出: 实体标识 + 诊断
// ==========================================
// 规则: 尽力提交; 子步骤失败记入诊断,不阻断实体发布
// 红线: 无锁的先查后建,同一引用的并发导入可能产生重复实体
// ==========================================

mod core;
mod deposit;
mod media;
mod product;
mod terms;


pub use core::{ImportReport, ReconciliationEngine, ReconciliationOptions};
pub use media::picture_fragment;
