use crate::metadata::token::Token;

/// A type signature as it comes out of the blob heap, before any token is realized.
///
/// Type references are still raw tokens (`TypeDefOrRefOrSpecEncoded`) and generic
/// parameters are plain indices whose owner is implied by the decoding context.
#[derive(Debug, Clone, PartialEq, Default)]
#[allow(missing_docs)]
pub enum SignatureType {
    #[default]
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    I,
    U,
    String,
    Object,
    TypedByRef,
    // TypeDefOrRefOrSpecEncoded
    Class(Token),
    // TypeDefOrRefOrSpecEncoded
    ValueType(Token),
    // Index into the generic parameters of the enclosing type
    Var(u32),
    // Index into the generic parameters of the enclosing method
    MVar(u32),
    SzArray(Box<SignatureType>),
    Array(Box<SignatureType>, SignatureArrayShape),
    Ptr(Box<SignatureType>),
    ByRef(Box<SignatureType>),
    Pinned(Box<SignatureType>),
    /// Required (`true`) or optional (`false`) custom modifier applied to the inner type
    Modified(bool, Token, Box<SignatureType>),
    GenericInst(Box<SignatureType>, Vec<SignatureType>),
    FnPtr(Box<SignatureMethod>),
}

/// Rank, sizes and lower bounds of a general (`ELEMENT_TYPE_ARRAY`) array
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureArrayShape {
    /// Number of dimensions
    pub rank: u32,
    /// Sizes of the leading dimensions that have one
    pub sizes: Vec<u32>,
    /// Lower bounds of the leading dimensions that have one
    pub lower_bounds: Vec<i32>,
}

/// A method signature (`MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig`), §II.23.2.1
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureMethod {
    /// Used to encode the keyword instance in the calling convention, see §II.15.3
    pub has_this: bool,
    /// Used to encode the keyword explicit in the calling convention, see §II.15.3
    pub explicit_this: bool,
    /// Used to encode the keyword vararg in the calling convention, see §II.15.3
    pub vararg: bool,
    /// Number of generic parameters of the method
    pub generic_param_count: u32,
    /// The return type
    pub return_type: SignatureType,
    /// The fixed parameters
    pub params: Vec<SignatureType>,
    /// The parameters following the sentinel of a vararg call site
    pub varargs: Vec<SignatureType>,
}

/// Signature attached to a `MemberRef` row: either a field or a method
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureMember {
    /// `FieldSig`, §II.23.2.4
    Field(SignatureType),
    /// `MethodRefSig`, §II.23.2.2
    Method(SignatureMethod),
}
