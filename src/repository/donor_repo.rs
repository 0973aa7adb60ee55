// ==========================================
// 血库管理核心 - 献血者数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: donor (医学属性) + donor_profile (联系资料)
// ==========================================

use crate::domain::donor::{DonorContact, DonorProfile, GeoPoint};
use crate::domain::types::BloodType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const DONOR_COLUMNS: &str =
    "donor_id, blood_type, last_donation_date, eligible_to_donate, created_at, updated_at";

const CONTACT_COLUMNS: &str = "donor_id, full_name, email, phone, city, latitude, longitude";

// ==========================================
// DonorRepository - 献血者仓储
// ==========================================
pub struct DonorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DonorRepository {
    /// 从共享连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入献血者及其联系资料（需在事务内调用）
    pub fn insert_in(
        conn: &Connection,
        donor: &DonorProfile,
        contact: &DonorContact,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO donor (
                donor_id, blood_type, last_donation_date, eligible_to_donate,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                donor.donor_id,
                donor.blood_type,
                donor.last_donation_date,
                donor.eligible_to_donate,
                donor.created_at,
                donor.updated_at,
            ],
        )?;

        conn.execute(
            r#"
            INSERT INTO donor_profile (
                donor_id, full_name, email, phone, city, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                contact.donor_id,
                contact.full_name,
                contact.email,
                contact.phone,
                contact.city,
                contact.location.map(|p| p.latitude),
                contact.location.map(|p| p.longitude),
            ],
        )?;

        Ok(())
    }

    /// 仅插入 donor 行（无联系资料，用于导入存量数据）
    pub fn insert_without_contact(&self, donor: &DonorProfile) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO donor (
                donor_id, blood_type, last_donation_date, eligible_to_donate,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                donor.donor_id,
                donor.blood_type,
                donor.last_donation_date,
                donor.eligible_to_donate,
                donor.created_at,
                donor.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 更新末次献血日期（需在事务内调用）
    pub fn update_last_donation_in(
        conn: &Connection,
        donor_id: &str,
        donation_date: NaiveDate,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE donor SET last_donation_date = ?1, updated_at = ?2 WHERE donor_id = ?3",
            params![donation_date, now, donor_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Donor", donor_id));
        }
        Ok(())
    }

    /// 更新登记资格标志（需在事务内调用）
    pub fn update_eligibility_in(
        conn: &Connection,
        donor_id: &str,
        eligible_to_donate: bool,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE donor SET eligible_to_donate = ?1, updated_at = ?2 WHERE donor_id = ?3",
            params![eligible_to_donate, now, donor_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Donor", donor_id));
        }
        Ok(())
    }

    /// 更新坐标（需在事务内调用）
    pub fn update_location_in(
        conn: &Connection,
        donor_id: &str,
        location: Option<GeoPoint>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE donor_profile SET latitude = ?1, longitude = ?2 WHERE donor_id = ?3",
            params![
                location.map(|p| p.latitude),
                location.map(|p| p.longitude),
                donor_id
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("DonorProfile", donor_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 donor_id 查询（事务内版本）
    pub fn find_by_id_in(
        conn: &Connection,
        donor_id: &str,
    ) -> RepositoryResult<Option<DonorProfile>> {
        let sql = format!("SELECT {} FROM donor WHERE donor_id = ?1", DONOR_COLUMNS);
        let donor = conn
            .query_row(&sql, params![donor_id], map_donor_row)
            .optional()?;
        Ok(donor)
    }

    /// 按 donor_id 查询
    pub fn find_by_id(&self, donor_id: &str) -> RepositoryResult<Option<DonorProfile>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, donor_id)
    }

    /// 查询联系资料
    pub fn find_contact(&self, donor_id: &str) -> RepositoryResult<Option<DonorContact>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM donor_profile WHERE donor_id = ?1", CONTACT_COLUMNS);
        let contact = conn
            .query_row(&sql, params![donor_id], map_contact_row)
            .optional()?;
        Ok(contact)
    }

    /// 查询具备登记资格、血型在给定集合内的献血者及其联系资料
    ///
    /// # 说明
    /// - donor 与 donor_profile 在 SQL 内联结; 缺失资料的献血者不在结果中
    /// - 过滤 eligible_to_donate = 1
    /// - 绑定参数个数等于血型个数（至多 8）,与献血者规模无关
    /// - 空血型集合直接返回空列表
    pub fn find_eligible_candidates(
        &self,
        blood_types: &[BloodType],
    ) -> RepositoryResult<Vec<(DonorProfile, DonorContact)>> {
        if blood_types.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; blood_types.len()].join(", ");
        let sql = format!(
            r#"
            SELECT d.donor_id, d.blood_type, d.last_donation_date, d.eligible_to_donate,
                   d.created_at, d.updated_at,
                   p.full_name, p.email, p.phone, p.city, p.latitude, p.longitude
              FROM donor d
              JOIN donor_profile p ON p.donor_id = d.donor_id
             WHERE d.eligible_to_donate = 1 AND d.blood_type IN ({})
             ORDER BY d.donor_id
            "#,
            placeholders
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let candidates = stmt
            .query_map(params_from_iter(blood_types.iter()), map_candidate_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(candidates)
    }

    /// 献血者总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM donor", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn map_donor_row(row: &Row<'_>) -> rusqlite::Result<DonorProfile> {
    Ok(DonorProfile {
        donor_id: row.get(0)?,
        blood_type: row.get(1)?,
        last_donation_date: row.get(2)?,
        eligible_to_donate: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_contact_row(row: &Row<'_>) -> rusqlite::Result<DonorContact> {
    let latitude: Option<f64> = row.get(5)?;
    let longitude: Option<f64> = row.get(6)?;
    Ok(DonorContact {
        donor_id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        city: row.get(4)?,
        location: to_geo_point(latitude, longitude),
    })
}

// 联结行: donor 列 0..=5, donor_profile 列 6..=11
fn map_candidate_row(row: &Row<'_>) -> rusqlite::Result<(DonorProfile, DonorContact)> {
    let donor = map_donor_row(row)?;
    let latitude: Option<f64> = row.get(10)?;
    let longitude: Option<f64> = row.get(11)?;
    let contact = DonorContact {
        donor_id: donor.donor_id.clone(),
        full_name: row.get(6)?,
        email: row.get(7)?,
        phone: row.get(8)?,
        city: row.get(9)?,
        location: to_geo_point(latitude, longitude),
    };
    Ok((donor, contact))
}

fn to_geo_point(latitude: Option<f64>, longitude: Option<f64>) -> Option<GeoPoint> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    }
}
