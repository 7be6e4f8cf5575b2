//! 値オブジェクト
//!
//! 不正な値を持つインスタンスは生成できない。検証はすべてコンストラクタで行う。

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

/// ユーザー ID の最大文字数
pub const USER_ID_MAX_LEN: usize = 64;
/// 表示名の最大文字数
pub const USERNAME_MAX_LEN: usize = 64;
/// メッセージ本文の最大文字数
pub const MESSAGE_CONTENT_MAX_LEN: usize = 2000;

fn validate_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(ValueObjectError::TooLong {
            field,
            max: max_len,
            actual: len,
        });
    }
    Ok(())
}

/// ユーザー ID
///
/// ユーザー管理サブシステムが発行する不透明な ID。会話の正規化キーに使うため `Ord` を実装する。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_text("user id", &value, USER_ID_MAX_LEN)?;
        // 制御文字はストレージのキー区切りに使うため不可
        if value.chars().any(char::is_control) {
            return Err(ValueObjectError::InvalidFormat("user id"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 表示名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_text("username", &value, USERNAME_MAX_LEN)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Username {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// メッセージ本文
///
/// 空文字列・空白のみは不可。内容はトリムせずそのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_text("message content", &value, MESSAGE_CONTENT_MAX_LEN)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

/// タイムスタンプ（UTC, Unix ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// 会話 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 接続 ID
///
/// トランスポート層の接続を指す不透明な参照。Registry はソケットそのものではなくこの ID だけを保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 会話の参加者ペア（正規化済み）
///
/// 2 つの ID を昇順に並べて保持するため、`new(a, b)` と `new(b, a)` は等しくなる。
/// 会話の検索は必ずこの型を経由すること。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[UserId; 2]", into = "[UserId; 2]")]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    pub fn new(a: UserId, b: UserId) -> Result<Self, ValueObjectError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(ValueObjectError::SameParticipant(a.into_string())),
        }
    }

    pub fn low(&self) -> &UserId {
        &self.low
    }

    pub fn high(&self) -> &UserId {
        &self.high
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        &self.low == user_id || &self.high == user_id
    }

    /// ストレージのインデックス用キー
    ///
    /// 区切り文字には ID に現れない制御文字 U+001F を使う。
    pub fn key(&self) -> String {
        format!("{}\u{1f}{}", self.low, self.high)
    }

    pub fn to_vec(&self) -> Vec<UserId> {
        vec![self.low.clone(), self.high.clone()]
    }
}

impl TryFrom<[UserId; 2]> for ParticipantPair {
    type Error = ValueObjectError;

    fn try_from([a, b]: [UserId; 2]) -> Result<Self, Self::Error> {
        Self::new(a, b)
    }
}

impl From<ParticipantPair> for [UserId; 2] {
    fn from(pair: ParticipantPair) -> Self {
        [pair.low, pair.high]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[test]
    fn test_user_id_rejects_empty_and_blank() {
        // テスト項目: 空文字列・空白のみのユーザー ID は生成できない
        // given (前提条件):
        let empty = String::new();
        let blank = "   ".to_string();

        // when (操作):
        let empty_result = UserId::new(empty);
        let blank_result = UserId::new(blank);

        // then (期待する結果):
        assert_eq!(empty_result, Err(ValueObjectError::Empty("user id")));
        assert_eq!(blank_result, Err(ValueObjectError::Empty("user id")));
    }

    #[test]
    fn test_user_id_rejects_too_long() {
        // テスト項目: 最大文字数を超えるユーザー ID は生成できない
        // given (前提条件):
        let long = "a".repeat(USER_ID_MAX_LEN + 1);

        // when (操作):
        let result = UserId::new(long);

        // then (期待する結果):
        assert!(matches!(result, Err(ValueObjectError::TooLong { .. })));
    }

    #[test]
    fn test_user_id_rejects_control_characters() {
        // テスト項目: 制御文字を含むユーザー ID は生成できない
        // given (前提条件):
        let value = "u1\u{1f}u2".to_string();

        // when (操作):
        let result = UserId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::InvalidFormat("user id")));
    }

    #[test]
    fn test_message_content_keeps_text_verbatim() {
        // テスト項目: メッセージ本文はトリムされずそのまま保持される
        // given (前提条件):
        let text = "  hola, ¿tienes el libro?  ".to_string();

        // when (操作):
        let content = MessageContent::new(text.clone()).unwrap();

        // then (期待する結果):
        assert_eq!(content.as_str(), text);
    }

    #[test]
    fn test_message_content_length_counts_characters() {
        // テスト項目: 文字数はバイト数ではなく文字単位で数えられる
        // given (前提条件):
        let text = "ñ".repeat(MESSAGE_CONTENT_MAX_LEN);

        // when (操作):
        let result = MessageContent::new(text);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_participant_pair_is_order_independent() {
        // テスト項目: 引数の順序に関係なく同じペアになる
        // given (前提条件):
        let u1 = user("u1");
        let u2 = user("u2");

        // when (操作):
        let ab = ParticipantPair::new(u1.clone(), u2.clone()).unwrap();
        let ba = ParticipantPair::new(u2.clone(), u1.clone()).unwrap();

        // then (期待する結果):
        assert_eq!(ab, ba);
        assert_eq!(ab.key(), ba.key());
        assert_eq!(ab.low(), &u1);
        assert_eq!(ab.high(), &u2);
    }

    #[test]
    fn test_participant_pair_rejects_same_user() {
        // テスト項目: 同一ユーザー同士のペアは生成できない
        // given (前提条件):
        let u1 = user("u1");

        // when (操作):
        let result = ParticipantPair::new(u1.clone(), u1);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ValueObjectError::SameParticipant("u1".to_string()))
        );
    }

    #[test]
    fn test_participant_pair_deserialize_canonicalizes() {
        // テスト項目: 逆順の配列からデシリアライズしても正規化される
        // given (前提条件):
        let json = r#"["u2","u1"]"#;

        // when (操作):
        let pair: ParticipantPair = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(pair.low().as_str(), "u1");
        assert_eq!(serde_json::to_string(&pair).unwrap(), r#"["u1","u2"]"#);
    }
}
