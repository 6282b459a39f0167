use bon::Builder;
use serde::{Deserialize, Serialize};

/// 溯源与路由元数据
///
/// 每条事件记录携带的流程层级/业务标识。`parent_process_instance_id`
/// 在打开子流程工作单元时由调用方显式传入（构造参数），而不是在发布
/// 时向引擎反查层级关系。
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// 流程实例 ID
    process_instance_id: String,
    /// 父流程实例 ID（根实例为 None）
    parent_process_instance_id: Option<String>,
    /// 流程定义 key（建模标识，路由键的组成部分）
    process_definition_key: String,
    /// 流程定义 ID（部署后的唯一标识）
    process_definition_id: String,
    /// 流程定义版本
    process_definition_version: i32,
    /// 业务键（可选）
    business_key: Option<String>,
}

impl Provenance {
    pub fn process_instance_id(&self) -> &str {
        &self.process_instance_id
    }

    pub fn parent_process_instance_id(&self) -> Option<&str> {
        self.parent_process_instance_id.as_deref()
    }

    pub fn process_definition_key(&self) -> &str {
        &self.process_definition_key
    }

    pub fn process_definition_id(&self) -> &str {
        &self.process_definition_id
    }

    pub fn process_definition_version(&self) -> i32 {
        self.process_definition_version
    }

    pub fn business_key(&self) -> Option<&str> {
        self.business_key.as_deref()
    }

    /// 派生子流程的溯源：子实例以当前实例为父，沿用定义信息由调用方覆盖
    pub fn child(&self, child_instance_id: impl Into<String>) -> Provenance {
        Provenance {
            process_instance_id: child_instance_id.into(),
            parent_process_instance_id: Some(self.process_instance_id.clone()),
            process_definition_key: self.process_definition_key.clone(),
            process_definition_id: self.process_definition_id.clone(),
            process_definition_version: self.process_definition_version,
            business_key: self.business_key.clone(),
        }
    }
}
