// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html


mod distributed;
mod efp;
mod model_panic;
mod simulation_equivalence;
mod simulation_injection;
