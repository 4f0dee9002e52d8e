// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use sluice_core::SystemMetricsProvider;
use sluice_infra::SysinfoMetricsProvider;

fn new_provider() -> SysinfoMetricsProvider {
    let _ = env_logger::builder().is_test(true).try_init();
    SysinfoMetricsProvider::new().expect("current process should be visible")
}

#[test]
fn test_provider_reads_current_process() {
    let provider = new_provider();
    provider.refresh();

    assert!(provider.available_processors().unwrap() >= 1);
    assert!(provider.process_cpu_time_nanos().is_ok());

    let cpu = provider.system_cpu_usage().unwrap();
    assert!(cpu <= 1.0);
}

#[test]
fn test_uptime_advances() {
    let provider = new_provider();
    let first = provider.process_uptime_millis().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    let second = provider.process_uptime_millis().unwrap();
    assert!(second >= first + 20);
}

#[cfg(unix)]
#[test]
fn test_load_average_is_known_on_unix() {
    let provider = new_provider();
    assert!(provider.system_load_average().unwrap() >= 0.0);
}

#[test]
fn test_cpu_time_is_cumulative() {
    let provider = new_provider();
    provider.refresh();
    let before = provider.process_cpu_time_nanos().unwrap();

    // Burn a little CPU so the counter has something to show.
    let mut acc = 0u64;
    for i in 0..5_000_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    std::hint::black_box(acc);

    provider.refresh();
    assert!(provider.process_cpu_time_nanos().unwrap() >= before);
}
