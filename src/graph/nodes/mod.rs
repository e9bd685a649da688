// Graph Nodes Module
// Individual node implementations

pub mod competitor_analysis;
pub mod investment_decision;
pub mod market_eval;
pub mod next_entity;
pub mod report;
pub mod search;
pub mod tech_summary;

pub use competitor_analysis::CompetitorAnalysisStage;
pub use investment_decision::InvestmentDecisionStage;
pub use market_eval::MarketEvalStage;
pub use next_entity::NextEntityNode;
pub use report::ReportNode;
pub use search::DiscoveryNode;
pub use tech_summary::TechSummaryStage;
