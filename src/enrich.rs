//! Pure per-object enrichment: UserAccountControl bit decoding, Windows
//! FILETIME conversion, and the derived risk tags (stale logons, low logon
//! counts, disabled/locked state, delegation, exposed credentials).
//!
//! Everything here is a pure function of the attribute record, the
//! configured thresholds, and an explicit clock value, so the engine can run
//! it per object in parallel.
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::object::DirectoryObject;

/// UserAccountControl bit -> name table. Reserved bits are ignored.
pub const UAC_FLAGS: &[(u32, &str)] = &[
    (0x0000_0001, "ADS_UF_SCRIPT"),
    (0x0000_0002, "ADS_UF_ACCOUNTDISABLE"),
    (0x0000_0008, "ADS_UF_HOMEDIR_REQUIRED"),
    (0x0000_0010, "ADS_UF_LOCKOUT"),
    (0x0000_0020, "ADS_UF_PASSWD_NOTREQD"),
    (0x0000_0040, "ADS_UF_PASSWD_CANT_CHANGE"),
    (0x0000_0080, "ADS_UF_ENCRYPTED_TEXT_PASSWORD_ALLOWED"),
    (0x0000_0100, "ADS_UF_TEMP_DUPLICATE_ACCOUNT"),
    (0x0000_0200, "ADS_UF_NORMAL_ACCOUNT"),
    (0x0000_0800, "ADS_UF_INTERDOMAIN_TRUST_ACCOUNT"),
    (0x0000_1000, "ADS_UF_WORKSTATION_TRUST_ACCOUNT"),
    (0x0000_2000, "ADS_UF_SERVER_TRUST_ACCOUNT"),
    (0x0001_0000, "ADS_UF_DONT_EXPIRE_PASSWD"),
    (0x0002_0000, "ADS_UF_MNS_LOGON_ACCOUNT"),
    (0x0004_0000, "ADS_UF_SMARTCARD_REQUIRED"),
    (0x0008_0000, "ADS_UF_TRUSTED_FOR_DELEGATION"),
    (0x0010_0000, "ADS_UF_NOT_DELEGATED"),
    (0x0020_0000, "ADS_UF_USE_DES_KEY_ONLY"),
    (0x0040_0000, "ADS_UF_DONT_REQUIRE_PREAUTH"),
    (0x0080_0000, "ADS_UF_PASSWORD_EXPIRED"),
    (0x0100_0000, "ADS_UF_TRUSTED_TO_AUTHENTICATE_FOR_DELEGATION"),
];

/// Names of every flag whose bit is set in `value`, in table order.
pub fn decode_uac(value: u32) -> Vec<&'static str> {
    UAC_FLAGS
        .iter()
        .filter(|(bit, _)| value & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Time attributes scanned on every object, in output order.
pub const TIME_ATTRIBUTES: &[&str] = &[
    "pwdlastset",
    "badpasswordtime",
    "lastlogon",
    "lastlogontimestamp",
    "accountexpires",
];

/// 100-nanosecond intervals between 1601-01-01 and 1970-01-01.
const WINDOWS_TO_UNIX_EPOCH_100NS: i64 = 116_444_736_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedTime {
    /// The attribute held the zero sentinel.
    NotRecorded,
    /// The attribute held the maximum representable value.
    NeverExpires,
    At(DateTime<Utc>),
}

impl fmt::Display for DecodedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedTime::NotRecorded => write!(f, "not recorded"),
            DecodedTime::NeverExpires => write!(f, "never expires"),
            DecodedTime::At(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

/// Convert a Windows FILETIME counter (100 ns intervals since 1601-01-01)
/// into UTC calendar time, honoring the zero and maximum sentinels.
pub fn decode_filetime(value: i64) -> DecodedTime {
    if value == 0 {
        return DecodedTime::NotRecorded;
    }
    if value == i64::MAX {
        return DecodedTime::NeverExpires;
    }
    let unix_100ns = value - WINDOWS_TO_UNIX_EPOCH_100NS;
    let secs = unix_100ns.div_euclid(10_000_000);
    let nanos = (unix_100ns.rem_euclid(10_000_000) * 100) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(t) => DecodedTime::At(t),
        None => DecodedTime::NotRecorded,
    }
}

fn stale_logon_tag(attr: &str) -> &'static str {
    if attr == "lastlogon" {
        "#BadAccount due to #StaleLogons at this Domain Controller"
    } else {
        "#BadAccount due to #StaleLogons replicated across the Domain. \
         See info on 'lastlogontimestamp' attribute for more information."
    }
}

/// Decode time attributes into readable values and tag stale logons.
fn enrich_timestamps(obj: &mut DirectoryObject, stale_after_days: i64, now: DateTime<Utc>) {
    for attr in TIME_ATTRIBUTES {
        let Some(raw) = obj.record.first(attr) else {
            continue;
        };
        let value = match raw.trim().parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("invalid {attr} value on {}: {raw}", obj.display_name);
                continue;
            }
        };
        let decoded = decode_filetime(value);
        if let DecodedTime::At(t) = decoded {
            let is_logon = *attr == "lastlogon" || *attr == "lastlogontimestamp";
            if is_logon && now - t > Duration::days(stale_after_days) {
                obj.push_tag(stale_logon_tag(attr));
            }
        }
        obj.timestamps.push((attr.to_string(), decoded.to_string()));
    }
}

fn enrich_uac(obj: &mut DirectoryObject) {
    let Some(raw) = obj.record.first("useraccountcontrol") else {
        return;
    };
    let value = match raw.trim().parse::<u32>() {
        Ok(v) => v,
        Err(_) => {
            log::warn!("invalid useraccountcontrol value on {}: {raw}", obj.display_name);
            return;
        }
    };
    let flags = decode_uac(value);
    if flags.contains(&"ADS_UF_SMARTCARD_REQUIRED") {
        obj.push_tag("#SmartcardRequired");
    }
    if flags.contains(&"ADS_UF_LOCKOUT") || flags.contains(&"ADS_UF_ACCOUNTDISABLE") {
        obj.push_tag("#BadAccount due to #DisabledOrLockedAccount at this Domain Controller");
    }
    if flags.contains(&"ADS_UF_PASSWORD_EXPIRED") {
        obj.push_tag("#BadAccount because #PasswordExpired at this Domain Controller");
    }
    if flags.contains(&"ADS_UF_TRUSTED_FOR_DELEGATION")
        || flags.contains(&"ADS_UF_TRUSTED_TO_AUTHENTICATE_FOR_DELEGATION")
    {
        obj.push_tag("#DelegationOpportunity");
    }
    if flags.contains(&"ADS_UF_NORMAL_ACCOUNT") {
        obj.push_tag("#NormalAccount");
    }
    if flags.contains(&"ADS_UF_SERVER_TRUST_ACCOUNT") {
        obj.push_tag("#ServerTrustAccount");
    }
    obj.uac_flags = flags.into_iter().map(str::to_string).collect();
}

fn enrich_logon_count(obj: &mut DirectoryObject, threshold: u32) {
    let Some(raw) = obj.record.first("logoncount") else {
        return;
    };
    match raw.trim().parse::<u32>() {
        Ok(count) if count < threshold => {
            obj.push_tag("#BadAccount due to #LowLogonCount at this Domain Controller");
        }
        Ok(_) => {}
        Err(_) => log::warn!("invalid logoncount value on {}: {raw}", obj.display_name),
    }
}

fn enrich_credentials(obj: &mut DirectoryObject) {
    if obj.record.has("userpassword") {
        obj.push_tag("#Creds because of #UserPasswordAttribute. This is a #HighImportance finding!");
    }
}

/// Run every pure enrichment rule against one object.
pub fn enrich(
    obj: &mut DirectoryObject,
    logon_count_threshold: u32,
    stale_after_days: i64,
    now: DateTime<Utc>,
) {
    enrich_logon_count(obj, logon_count_threshold);
    enrich_timestamps(obj, stale_after_days, now);
    enrich_uac(obj);
    enrich_credentials(obj);
}
