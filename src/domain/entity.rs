// ==========================================
// 联系人导入服务 - 规范化实体
// ==========================================
// 对齐: contacts / companies / addresses / email_addresses / phone_numbers / urls 表
// 红线: 每条实体记录回指来源暂存行 (source_data_id)
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// 写入模型（由转换引擎按行生成）
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddressRecord {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumberRecord {
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
}

// ==========================================
// EntityBundle - 单行转换产物
// ==========================================
// 归属规则:
// - 有 contact → 子记录归属 contact，contact.company_id 指向 company
// - 仅 company → 子记录归属 company
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBundle {
    pub contact: Option<ContactRecord>,
    pub company: Option<CompanyRecord>,
    pub address: Option<AddressRecord>,
    pub emails: Vec<EmailAddressRecord>,
    pub phones: Vec<PhoneNumberRecord>,
    pub urls: Vec<UrlRecord>,
}

impl EntityBundle {
    pub fn is_empty(&self) -> bool {
        self.contact.is_none()
            && self.company.is_none()
            && self.address.is_none()
            && self.emails.is_empty()
            && self.phones.is_empty()
            && self.urls.is_empty()
    }

    pub fn has_children(&self) -> bool {
        self.address.is_some()
            || !self.emails.is_empty()
            || !self.phones.is_empty()
            || !self.urls.is_empty()
    }

    /// 写入的实体记录总数
    pub fn record_count(&self) -> usize {
        usize::from(self.contact.is_some())
            + usize::from(self.company.is_some())
            + usize::from(self.address.is_some())
            + self.emails.len()
            + self.phones.len()
            + self.urls.len()
    }
}

/// 单行写入结果（新实体主键）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBundle {
    pub contact_id: Option<i64>,
    pub company_id: Option<i64>,
    pub child_ids: Vec<i64>,
}

// ==========================================
// 读取模型
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub source_data_id: i64,
    pub team_id: String,
    pub list_id: Option<String>,
    pub company_id: Option<i64>,
    #[serde(flatten)]
    pub fields: ContactRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub source_data_id: i64,
    pub team_id: String,
    #[serde(flatten)]
    pub fields: CompanyRecord,
}

/// 子实体（地址/邮箱/电话/网址）的统一读取视图
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildEntity {
    pub id: i64,
    pub source_data_id: i64,
    pub contact_id: Option<i64>,
    pub company_id: Option<i64>,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_counts() {
        let mut bundle = EntityBundle::default();
        assert!(bundle.is_empty());

        bundle.contact = Some(ContactRecord::default());
        bundle.emails.push(EmailAddressRecord {
            email: "a@x.com".to_string(),
        });
        bundle.emails.push(EmailAddressRecord {
            email: "b@x.com".to_string(),
        });

        assert!(!bundle.is_empty());
        assert!(bundle.has_children());
        assert_eq!(bundle.record_count(), 3);
    }
}
