//! 审计事件流水线领域层（audit-domain）
//!
//! 提供流程引擎生命周期事件的事务化采集与发布构件：
//! - 事件模型（`event`）：封闭的事件类型/载荷/溯源元数据与不可变事件记录
//! - 事务缓冲区（`buffer`）：以句柄寻址的单工作单元事件累积与定序
//! - 事件系统（`eventing`）：总线协议、内存总线与事务化发布器
//! - 定时任务（`timer`）：有界重试的定时器生命周期状态机
//!
//! 本 crate 不包含任何 BPMN 执行语义与持久化实现：引擎状态由外部协作方
//! 持有，这里只负责把一个工作单元内产生的事件按因果序收集，并在提交时
//! 作为单条批次消息原子发布（回滚则全量丢弃）。
//!
//! 典型用法：
//! 1. 工作单元开始时通过 `EventAggregator::begin` 取得缓冲区句柄；
//! 2. 引擎通知到达时以 `append` 追加 `RawEvent`，由缓冲区定序；
//! 3. 工作单元结束时调用 `TransactionalPublisher::on_outcome`，
//!    提交则整批发布至 `EventBus`，回滚则静默丢弃。
//!
pub mod buffer;
pub mod error;
pub mod event;
pub mod eventing;
pub mod timer;
