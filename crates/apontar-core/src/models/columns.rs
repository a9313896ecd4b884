//! Column names used by the `apontamentos` sheet.
//!
//! The workbook is shared with older revisions of the entry form, so these
//! names are a wire contract and must match the header row byte for byte.

pub const ID: &str = "ID";
pub const STUDY: &str = "Código do Estudo";
pub const RESEARCH_NAME: &str = "Nome da Pesquisa";
pub const RAISED_ON: &str = "Data do Apontamento";
pub const RAISED_BY: &str = "Responsável Pelo Apontamento";
pub const ORIGIN: &str = "Origem Do Apontamento";
pub const DOCUMENT: &str = "Documentos";
pub const PARTICIPANT: &str = "Participante";
pub const PERIOD: &str = "Período";
pub const CRITICALITY: &str = "Grau De Criticidade Do Apontamento";
pub const DEADLINE: &str = "Prazo Para Resolução";
pub const FINDING: &str = "Apontamento";
pub const STATUS: &str = "Status";
pub const VERIFIER: &str = "Verificador";
pub const VERIFIED_ON: &str = "Data de Verificação";
pub const JUSTIFICATION: &str = "Justificativa";
pub const RESOLVED_ON: &str = "Data de Resolução";
pub const CORRECTED_BY: &str = "Responsável Pela Correção";
pub const SHIFT: &str = "Plantão";
pub const DEPARTMENT: &str = "Departamento";
pub const TENURE: &str = "Tempo de casa";
pub const UPDATED_AT: &str = "Atualização";
pub const UPDATED_BY: &str = "Responsável Atualização";

/// Column order used when a new workbook is created from scratch.
pub const CANONICAL_ORDER: &[&str] = &[
    ID,
    STUDY,
    RESEARCH_NAME,
    RAISED_ON,
    RAISED_BY,
    ORIGIN,
    DOCUMENT,
    PARTICIPANT,
    PERIOD,
    CRITICALITY,
    DEADLINE,
    FINDING,
    STATUS,
    VERIFIER,
    VERIFIED_ON,
    JUSTIFICATION,
    RESOLVED_ON,
    CORRECTED_BY,
    SHIFT,
    DEPARTMENT,
    TENURE,
    UPDATED_AT,
    UPDATED_BY,
];
