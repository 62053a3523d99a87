use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use leave_ledger::{Ledger, Operation, RequestCategory, RequestStatus, SubjectId};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn as_of() -> NaiveDate {
    date(2026, 8, 30)
}

/// Generates valid operation sequences for benchmarking.
///
/// Pattern per subject:
/// 1. Grant for 2023 and 2024 (both vested as of the pinned date)
/// 2. 10-day block, 15-day block, 5-day discount (drains 2023 exactly)
/// 3. The same trio again (drains 2024 exactly)
///
/// This ensures every submission is accepted.
struct OpGenerator {
    num_subjects: SubjectId,
    current_subject: SubjectId,
    current_step: u32,
}

impl OpGenerator {
    fn new(num_subjects: SubjectId) -> Self {
        Self {
            num_subjects,
            current_subject: 1,
            current_step: 0,
        }
    }

    /// Accepted requests each generator run produces per subject.
    const REQUESTS_PER_SUBJECT: u64 = 6;
}

impl Iterator for OpGenerator {
    type Item = Operation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_subject > self.num_subjects {
            return None;
        }

        let subject = self.current_subject;
        let op = match self.current_step {
            0 | 1 => {
                let year = 2023 + self.current_step as i32;
                Operation::Grant {
                    subject,
                    reference_year: year,
                    period_start: date(year, 1, 1),
                    period_end: date(year, 12, 31),
                }
            }
            step => {
                let (category, explicit_days) = match (step - 2) % 3 {
                    0 => (RequestCategory::Days10, None),
                    1 => (RequestCategory::Days15, None),
                    _ => (RequestCategory::Discount, Some(5)),
                };
                Operation::Submit {
                    subject,
                    category,
                    start_date: date(2026, 9, 1),
                    explicit_days,
                }
            }
        };

        self.current_step += 1;
        if self.current_step >= 2 + Self::REQUESTS_PER_SUBJECT as u32 {
            self.current_step = 0;
            self.current_subject += 1;
        }

        Some(op)
    }
}

fn bench_submissions(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("submissions");

    for subjects in [100u32, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(subjects),
            &subjects,
            |b, &subjects| {
                b.iter(|| {
                    rt.block_on(async {
                        let ledger = Ledger::with_today(as_of());
                        for op in OpGenerator::new(subjects) {
                            let _ = black_box(ledger.apply(op).await);
                        }
                        ledger
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_with_transitions(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("with_transitions");

    // submit everything, then cancel each subject's first request
    group.bench_function("1k_subjects_cancel_first", |b| {
        b.iter(|| {
            rt.block_on(async {
                let subjects = 1_000u32;
                let ledger = Ledger::with_today(as_of());
                for op in OpGenerator::new(subjects) {
                    let _ = black_box(ledger.apply(op).await);
                }
                for subject in 1..=subjects {
                    let first_request =
                        u64::from(subject - 1) * OpGenerator::REQUESTS_PER_SUBJECT + 1;
                    let _ = black_box(
                        ledger
                            .transition_status(first_request, RequestStatus::Cancelled, None)
                            .await,
                    );
                }
                ledger
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_submissions, bench_with_transitions);
criterion_main!(benches);
